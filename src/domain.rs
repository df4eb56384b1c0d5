use crate::errors::{RepoError, StorageError};
use crate::models::{GalleryImage, Group, User, Vote, VotingRound};
use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

/// Trait defining operations on users, groups and memberships.
#[async_trait]
pub trait DirectoryRepository: Send + Sync + 'static {
    /// Creates a user. Fails with `DuplicateUsername` if the name is taken.
    async fn create_user(&self, user: &User) -> Result<(), RepoError>;

    /// Returns Ok(None) if no user has this id.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;

    /// Increments a user's total win counter.
    async fn record_win(&self, user_id: Uuid) -> Result<(), RepoError>;

    /// Users ordered by total wins (desc), at most `limit` entries.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<User>, RepoError>;

    /// Creates a group. Fails with `DuplicateGroupName` if the name is taken.
    async fn create_group(&self, group: &Group) -> Result<(), RepoError>;

    async fn get_group(&self, id: Uuid) -> Result<Option<Group>, RepoError>;

    async fn list_groups(&self) -> Result<Vec<Group>, RepoError>;

    /// Adds a membership. Returns false if the user was already a member.
    async fn add_member(&self, user_id: Uuid, group_id: Uuid) -> Result<bool, RepoError>;

    async fn is_member(&self, user_id: Uuid, group_id: Uuid) -> Result<bool, RepoError>;

    /// Members of a group, in join order. The member status banner preserves
    /// this ordering.
    async fn members_of(&self, group_id: Uuid) -> Result<Vec<User>, RepoError>;
}

/// Trait defining operations on rounds, images and votes.
#[async_trait]
pub trait GalleryRepository: Send + Sync + 'static {
    /// Opens a fresh round for the group with the next round number.
    /// Fails with `RoundStillActive` while the group has an open round.
    async fn open_round(&self, group_id: Uuid) -> Result<VotingRound, RepoError>;

    /// The round with no end time, if any. At most one exists per group.
    async fn active_round(&self, group_id: Uuid) -> Result<Option<VotingRound>, RepoError>;

    /// The most recently finished round for the group, if any.
    async fn last_finished_round(&self, group_id: Uuid)
    -> Result<Option<VotingRound>, RepoError>;

    /// Ends a round, recording the winner (user, image) when one exists.
    /// Fails with `RoundAlreadyClosed` if the round is not active.
    async fn close_round(
        &self,
        round_id: Uuid,
        winner: Option<(Uuid, Uuid)>,
    ) -> Result<(), RepoError>;

    /// Ends a round and opens its successor as one transition, returning the
    /// new round. Fails with `RoundAlreadyClosed` if another request finished
    /// the round first; of concurrent completing votes, exactly one wins.
    async fn finish_round(
        &self,
        round_id: Uuid,
        winner: Option<(Uuid, Uuid)>,
    ) -> Result<VotingRound, RepoError>;

    async fn add_image(&self, image: &GalleryImage) -> Result<(), RepoError>;

    async fn get_image(&self, image_id: Uuid) -> Result<Option<GalleryImage>, RepoError>;

    /// Images of a round, ordered by votes (desc), then upload time (desc).
    async fn round_images(&self, round_id: Uuid) -> Result<Vec<GalleryImage>, RepoError>;

    /// The image the user uploaded in this round, if any.
    async fn user_image_in_round(
        &self,
        user_id: Uuid,
        round_id: Uuid,
    ) -> Result<Option<GalleryImage>, RepoError>;

    /// The vote the user holds in this round, if any.
    async fn user_vote_in_round(
        &self,
        user_id: Uuid,
        round_id: Uuid,
    ) -> Result<Option<Vote>, RepoError>;

    /// Records a vote and bumps the image tally. Returns the new tally.
    /// Fails with `DuplicateVote` if the user already voted in the round.
    async fn cast_vote(
        &self,
        user_id: Uuid,
        image_id: Uuid,
        round_id: Uuid,
    ) -> Result<u32, RepoError>;

    /// Removes the user's vote in the round, if any, decrementing the image
    /// tally. Returns the affected image and its new tally.
    async fn retract_vote(
        &self,
        user_id: Uuid,
        round_id: Uuid,
    ) -> Result<Option<(Uuid, u32)>, RepoError>;

    /// Distinct users holding a vote in the round.
    async fn voters_in_round(&self, round_id: Uuid) -> Result<HashSet<Uuid>, RepoError>;
}

/// Trait defining operations for storing and retrieving image files.
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    /// Uploads file data to the storage backend.
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), StorageError>;

    /// Downloads file data and its content type.
    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError>;
}
