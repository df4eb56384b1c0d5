use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Server-side entities ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub total_wins: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Group {
    pub group_id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
}

/// One voting period within a group. At most one round per group is active
/// (`ended_at` is `None`) at any time.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VotingRound {
    pub round_id: Uuid,
    pub group_id: Uuid,
    pub round_number: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub winner_id: Option<Uuid>,
    pub winning_image_id: Option<Uuid>,
}

impl VotingRound {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GalleryImage {
    pub image_id: Uuid,
    pub group_id: Uuid,
    pub round_id: Uuid,
    pub uploader_id: Uuid,
    pub file_key: String,
    pub uploaded_at: DateTime<Utc>,
    pub votes_count: u32,
}

/// A cast vote. The store enforces at most one per user per round.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub user_id: Uuid,
    pub image_id: Uuid,
    pub round_id: Uuid,
}

// --- Wire types shared between the vote endpoint and the click handler ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberVoteStatus {
    pub username: String,
    pub has_voted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WinnerInfo {
    pub username: String,
    pub votes: u32,
    pub image_id: Uuid,
    pub image_url: String,
    pub message: String,
}

/// Body of a `POST /vote_image/{image_id}` response.
///
/// `votes_count` and `has_voted` describe the clicked image after the vote
/// was applied. `old_voted_image_id`/`old_votes_count` are present when the
/// vote was transferred off another image, so the client can clear that
/// image's voted state. `member_vote_statuses` replaces the member banner
/// wholesale. `game_ended_early` signals that this vote concluded the round.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub votes_count: u32,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_voted_image_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_votes_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_vote_statuses: Option<Vec<MemberVoteStatus>>,
    #[serde(default)]
    pub game_ended_early: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_info: Option<WinnerInfo>,
}

impl VoteResponse {
    /// A rejection body: `success: false` plus a user-facing message.
    pub fn rejection(message: impl Into<String>) -> Self {
        VoteResponse {
            success: false,
            message: Some(message.into()),
            votes_count: 0,
            has_voted: false,
            old_voted_image_id: None,
            old_votes_count: None,
            member_vote_statuses: None,
            game_ended_early: false,
            winner_info: None,
        }
    }
}

// --- Request/response bodies for the remaining endpoints ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LeaderboardEntry {
    pub username: String,
    pub total_wins: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupsOverview {
    pub groups: Vec<Group>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Per-viewer projection of one image for the grid: the data attributes and
/// displayed values an image card carries.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ImageCard {
    pub image_id: Uuid,
    pub file_url: String,
    pub uploader_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub votes: u32,
    pub has_voted: bool,
    pub is_uploader: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PastWinner {
    pub round_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerInfo>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupDetail {
    pub group: Group,
    pub round_number: u32,
    pub images: Vec<ImageCard>,
    pub member_vote_statuses: Vec<MemberVoteStatus>,
    pub min_members_met: bool,
    pub already_uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub past_winner: Option<PastWinner>,
}
