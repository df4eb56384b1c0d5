//! Client-side view model for the image grid and member banner.
//!
//! The view model is the only client-side state; `apply` folds a vote
//! outcome into it and returns the patches a rendering layer must perform.
//! Keeping this pure makes the click handler's behavior testable without a
//! DOM or a network.

use crate::client::VoteOutcome;
use crate::models::MemberVoteStatus;
use uuid::Uuid;

pub const SELF_VOTE_MESSAGE: &str = "You cannot vote on your own image.";
const REJECTED_FALLBACK_MESSAGE: &str = "Could not process vote.";
const ROUND_ENDED_MESSAGE: &str = "Round ended!";

/// Message fragments that mean the displayed round is stale and the page
/// must be reloaded to resynchronize.
const STALE_ROUND_MARKERS: [&str; 2] =
    ["No active voting round", "Voting for this period has ended"];

/// One image card in the grid: the id and uploader flag it carries as data
/// attributes, plus its displayed tally and voted highlight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub image_id: Uuid,
    pub is_uploader: bool,
    pub votes: u32,
    pub voted: bool,
}

/// One entry of the member status banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberBadge {
    pub username: String,
    pub voted: bool,
}

impl MemberBadge {
    /// Rendered banner text, checkmark for voted members.
    pub fn label(&self) -> String {
        if self.voted {
            format!("{} ✅", self.username)
        } else {
            format!("{} ⚪", self.username)
        }
    }
}

impl From<&MemberVoteStatus> for MemberBadge {
    fn from(status: &MemberVoteStatus) -> Self {
        MemberBadge {
            username: status.username.clone(),
            voted: status.has_voted,
        }
    }
}

/// Where a click landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// Not inside any image card.
    Outside,
    /// Inside the card for this image.
    Card(Uuid),
}

/// What to do about a click, decided before any request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    /// Not a card, or an unknown card: no-op, not an error.
    Ignore,
    /// The viewer uploaded this image; notify, send nothing.
    RejectSelfVote,
    /// Issue a vote request for this image.
    SubmitVote(Uuid),
}

/// A single DOM write the rendering layer must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    SetVoteCount { image_id: Uuid, votes: u32 },
    SetVoted { image_id: Uuid, voted: bool },
    /// Rebuild the member banner from scratch with these badges.
    ReplaceBanner(Vec<MemberBadge>),
    /// Alert-style notification.
    Notify(String),
    /// Reload the page; server-rendered state is authoritative again.
    Reload,
}

#[derive(Debug, Clone, Default)]
pub struct GalleryView {
    cards: Vec<CardView>,
    banner: Vec<MemberBadge>,
}

impl GalleryView {
    pub fn new(cards: Vec<CardView>, banner: Vec<MemberBadge>) -> Self {
        Self { cards, banner }
    }

    pub fn card(&self, image_id: Uuid) -> Option<&CardView> {
        self.cards.iter().find(|c| c.image_id == image_id)
    }

    fn card_mut(&mut self, image_id: Uuid) -> Option<&mut CardView> {
        self.cards.iter_mut().find(|c| c.image_id == image_id)
    }

    pub fn banner(&self) -> &[MemberBadge] {
        &self.banner
    }

    /// Decides what a click means. Self-votes are refused here so no
    /// request is ever sent for them.
    pub fn on_click(&self, target: ClickTarget) -> ClickAction {
        let ClickTarget::Card(image_id) = target else {
            return ClickAction::Ignore;
        };
        match self.card(image_id) {
            None => ClickAction::Ignore,
            Some(card) if card.is_uploader => ClickAction::RejectSelfVote,
            Some(card) => ClickAction::SubmitVote(card.image_id),
        }
    }

    /// Folds the outcome of a vote request for `image_id` into the view and
    /// returns the DOM patches to render. Every response is treated as
    /// authoritative at the time it arrives; when concurrent requests are in
    /// flight, the last outcome applied wins.
    pub fn apply(&mut self, image_id: Uuid, outcome: &VoteOutcome) -> Vec<Patch> {
        match outcome {
            VoteOutcome::Applied(resp) if resp.success => {
                let mut patches = Vec::new();

                if let Some(card) = self.card_mut(image_id) {
                    card.votes = resp.votes_count;
                    card.voted = resp.has_voted;
                    patches.push(Patch::SetVoteCount {
                        image_id,
                        votes: resp.votes_count,
                    });
                    patches.push(Patch::SetVoted {
                        image_id,
                        voted: resp.has_voted,
                    });
                }

                // Vote transfer: the previous vote was retracted server-side,
                // so the old card loses its highlight and gets its new tally.
                if let Some(old_id) = resp.old_voted_image_id {
                    if let Some(old_card) = self.card_mut(old_id) {
                        old_card.voted = false;
                        patches.push(Patch::SetVoted {
                            image_id: old_id,
                            voted: false,
                        });
                        if let Some(old_votes) = resp.old_votes_count {
                            old_card.votes = old_votes;
                            patches.push(Patch::SetVoteCount {
                                image_id: old_id,
                                votes: old_votes,
                            });
                        }
                    }
                }

                if let Some(statuses) = &resp.member_vote_statuses {
                    let badges: Vec<MemberBadge> = statuses.iter().map(Into::into).collect();
                    self.banner = badges.clone();
                    patches.push(Patch::ReplaceBanner(badges));
                }

                if resp.game_ended_early {
                    let message = resp
                        .message
                        .clone()
                        .unwrap_or_else(|| ROUND_ENDED_MESSAGE.to_string());
                    patches.push(Patch::Notify(message));
                    patches.push(Patch::Reload);
                }

                patches
            }
            VoteOutcome::Applied(resp) => {
                let message = resp
                    .message
                    .clone()
                    .unwrap_or_else(|| REJECTED_FALLBACK_MESSAGE.to_string());
                let mut patches = vec![Patch::Notify(message.clone())];
                if STALE_ROUND_MARKERS.iter().any(|m| message.contains(m)) {
                    patches.push(Patch::Reload);
                }
                patches
            }
            VoteOutcome::Rejected { message, .. } => {
                vec![Patch::Notify(message.clone()), Patch::Reload]
            }
            VoteOutcome::Failed(detail) => vec![
                Patch::Notify(format!("An error occurred during voting: {}", detail)),
                Patch::Reload,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteResponse;

    fn ok_response() -> VoteResponse {
        VoteResponse {
            success: true,
            message: None,
            votes_count: 0,
            has_voted: false,
            old_voted_image_id: None,
            old_votes_count: None,
            member_vote_statuses: None,
            game_ended_early: false,
            winner_info: None,
        }
    }

    fn view_with(cards: Vec<CardView>) -> GalleryView {
        GalleryView::new(
            cards,
            vec![MemberBadge {
                username: "carol".to_string(),
                voted: true,
            }],
        )
    }

    fn card(image_id: Uuid, is_uploader: bool, votes: u32, voted: bool) -> CardView {
        CardView {
            image_id,
            is_uploader,
            votes,
            voted,
        }
    }

    #[test]
    fn click_outside_cards_is_ignored() {
        let view = view_with(vec![card(Uuid::new_v4(), false, 0, false)]);
        assert_eq!(view.on_click(ClickTarget::Outside), ClickAction::Ignore);
        assert_eq!(
            view.on_click(ClickTarget::Card(Uuid::new_v4())),
            ClickAction::Ignore
        );
    }

    #[test]
    fn clicking_own_image_is_refused_without_a_request() {
        let id = Uuid::new_v4();
        let view = view_with(vec![card(id, true, 0, false)]);
        assert_eq!(
            view.on_click(ClickTarget::Card(id)),
            ClickAction::RejectSelfVote
        );
    }

    #[test]
    fn clicking_another_members_image_submits_a_vote() {
        let id = Uuid::new_v4();
        let view = view_with(vec![card(id, false, 0, false)]);
        assert_eq!(
            view.on_click(ClickTarget::Card(id)),
            ClickAction::SubmitVote(id)
        );
    }

    #[test]
    fn successful_vote_updates_count_and_highlight() {
        let id = Uuid::new_v4();
        let mut view = view_with(vec![card(id, false, 4, false)]);

        let resp = VoteResponse {
            votes_count: 5,
            has_voted: true,
            ..ok_response()
        };
        let patches = view.apply(id, &VoteOutcome::Applied(resp));

        assert_eq!(
            patches,
            vec![
                Patch::SetVoteCount {
                    image_id: id,
                    votes: 5
                },
                Patch::SetVoted {
                    image_id: id,
                    voted: true
                },
            ]
        );
        let card = view.card(id).unwrap();
        assert_eq!(card.votes, 5);
        assert!(card.voted);
    }

    #[test]
    fn vote_transfer_clears_the_previous_card() {
        let new_id = Uuid::new_v4();
        let old_id = Uuid::new_v4();
        let mut view = view_with(vec![
            card(new_id, false, 0, false),
            card(old_id, false, 4, true),
        ]);

        let resp = VoteResponse {
            votes_count: 1,
            has_voted: true,
            old_voted_image_id: Some(old_id),
            old_votes_count: Some(3),
            ..ok_response()
        };
        let patches = view.apply(new_id, &VoteOutcome::Applied(resp));

        assert!(patches.contains(&Patch::SetVoted {
            image_id: old_id,
            voted: false
        }));
        assert!(patches.contains(&Patch::SetVoteCount {
            image_id: old_id,
            votes: 3
        }));
        let old_card = view.card(old_id).unwrap();
        assert!(!old_card.voted);
        assert_eq!(old_card.votes, 3);
        assert!(view.card(new_id).unwrap().voted);
    }

    #[test]
    fn banner_is_replaced_wholesale() {
        let id = Uuid::new_v4();
        let mut view = view_with(vec![card(id, false, 0, false)]);

        let resp = VoteResponse {
            votes_count: 1,
            has_voted: true,
            member_vote_statuses: Some(vec![
                MemberVoteStatus {
                    username: "alice".to_string(),
                    has_voted: true,
                },
                MemberVoteStatus {
                    username: "bob".to_string(),
                    has_voted: false,
                },
            ]),
            ..ok_response()
        };
        view.apply(id, &VoteOutcome::Applied(resp));

        assert_eq!(view.banner().len(), 2);
        assert_eq!(view.banner()[0].label(), "alice ✅");
        assert_eq!(view.banner()[1].label(), "bob ⚪");
    }

    #[test]
    fn early_round_end_notifies_then_reloads() {
        let id = Uuid::new_v4();
        let mut view = view_with(vec![card(id, false, 0, false)]);

        let resp = VoteResponse {
            votes_count: 2,
            has_voted: true,
            game_ended_early: true,
            message: Some("All members have voted! Round ended.".to_string()),
            ..ok_response()
        };
        let patches = view.apply(id, &VoteOutcome::Applied(resp));

        let notify_at = patches
            .iter()
            .position(|p| matches!(p, Patch::Notify(_)))
            .unwrap();
        let reload_at = patches.iter().position(|p| *p == Patch::Reload).unwrap();
        assert!(notify_at < reload_at);
    }

    #[test]
    fn http_failure_surfaces_message_and_reloads() {
        let id = Uuid::new_v4();
        let mut view = view_with(vec![card(id, false, 0, false)]);

        let patches = view.apply(
            id,
            &VoteOutcome::Rejected {
                status: 500,
                message: "Server error".to_string(),
            },
        );
        assert_eq!(
            patches,
            vec![Patch::Notify("Server error".to_string()), Patch::Reload]
        );
    }

    #[test]
    fn stale_round_rejection_reloads() {
        let id = Uuid::new_v4();
        let mut view = view_with(vec![card(id, false, 0, false)]);

        let resp = VoteResponse::rejection("No active voting round. Please wait.");
        let patches = view.apply(id, &VoteOutcome::Applied(resp));
        assert_eq!(patches.last(), Some(&Patch::Reload));
    }

    #[test]
    fn other_rejections_do_not_reload() {
        let id = Uuid::new_v4();
        let mut view = view_with(vec![card(id, false, 0, false)]);

        let resp = VoteResponse::rejection("You are not a member of this group.");
        let patches = view.apply(id, &VoteOutcome::Applied(resp));
        assert_eq!(
            patches,
            vec![Patch::Notify(
                "You are not a member of this group.".to_string()
            )]
        );
    }

    #[test]
    fn transport_failure_wraps_detail_and_reloads() {
        let id = Uuid::new_v4();
        let mut view = view_with(vec![card(id, false, 0, false)]);

        let patches = view.apply(id, &VoteOutcome::Failed("connection refused".to_string()));
        assert_eq!(
            patches,
            vec![
                Patch::Notify("An error occurred during voting: connection refused".to_string()),
                Patch::Reload,
            ]
        );
    }
}
