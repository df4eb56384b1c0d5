use crate::models::GalleryImage;
use std::collections::HashSet;
use uuid::Uuid;

/// Result of tallying a finished round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A unique image holds the maximum tally.
    Winner {
        user_id: Uuid,
        image_id: Uuid,
        votes: u32,
    },
    /// Several images share the maximum tally; nobody wins.
    Tie { votes: u32, uploader_ids: Vec<Uuid> },
    /// Images exist but none received a vote.
    NoVotes,
    /// Nothing was uploaded this round.
    NoImages,
}

/// Tallies a round's images into an outcome.
pub fn determine_outcome(images: &[GalleryImage]) -> RoundOutcome {
    let Some(max_votes) = images.iter().map(|i| i.votes_count).max() else {
        return RoundOutcome::NoImages;
    };
    if max_votes == 0 {
        return RoundOutcome::NoVotes;
    }

    let leaders: Vec<&GalleryImage> = images
        .iter()
        .filter(|i| i.votes_count == max_votes)
        .collect();
    match leaders.as_slice() {
        [single] => RoundOutcome::Winner {
            user_id: single.uploader_id,
            image_id: single.image_id,
            votes: max_votes,
        },
        _ => RoundOutcome::Tie {
            votes: max_votes,
            uploader_ids: leaders.iter().map(|i| i.uploader_id).collect(),
        },
    }
}

/// A round ends early once every group member holds a vote, provided the
/// group meets the minimum size.
pub fn round_complete(
    member_ids: &[Uuid],
    voters: &HashSet<Uuid>,
    min_round_members: usize,
) -> bool {
    member_ids.len() >= min_round_members && member_ids.iter().all(|m| voters.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn image(votes: u32) -> GalleryImage {
        GalleryImage {
            image_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            round_id: Uuid::new_v4(),
            uploader_id: Uuid::new_v4(),
            file_key: "x.png".to_string(),
            uploaded_at: Utc::now(),
            votes_count: votes,
        }
    }

    #[test]
    fn unique_maximum_wins() {
        let images = vec![image(1), image(3), image(2)];
        let outcome = determine_outcome(&images);
        assert_eq!(
            outcome,
            RoundOutcome::Winner {
                user_id: images[1].uploader_id,
                image_id: images[1].image_id,
                votes: 3,
            }
        );
    }

    #[test]
    fn shared_maximum_is_a_tie() {
        let images = vec![image(2), image(2), image(1)];
        match determine_outcome(&images) {
            RoundOutcome::Tie { votes, uploader_ids } => {
                assert_eq!(votes, 2);
                assert_eq!(
                    uploader_ids,
                    vec![images[0].uploader_id, images[1].uploader_id]
                );
            }
            other => panic!("expected tie, got {:?}", other),
        }
    }

    #[test]
    fn zero_votes_has_no_winner() {
        assert_eq!(determine_outcome(&[image(0), image(0)]), RoundOutcome::NoVotes);
        assert_eq!(determine_outcome(&[]), RoundOutcome::NoImages);
    }

    #[test]
    fn round_completes_only_when_all_members_voted() {
        let members: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut voters: HashSet<Uuid> = members.iter().copied().take(2).collect();
        assert!(!round_complete(&members, &voters, 3));

        voters.insert(members[2]);
        assert!(round_complete(&members, &voters, 3));

        // Too few members keeps the round open even when everyone voted.
        assert!(!round_complete(&members[..2], &voters, 3));
    }
}
