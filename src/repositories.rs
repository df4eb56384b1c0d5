use crate::{
    domain::{DirectoryRepository, GalleryRepository},
    errors::RepoError,
    models::{GalleryImage, Group, User, Vote, VotingRound},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

// The process is the system of record: all directory and gallery state lives
// in memory and is gone on restart.

#[derive(Default)]
struct DirectoryInner {
    users: HashMap<Uuid, User>,
    groups: HashMap<Uuid, Group>,
    // (user, group) pairs in join order.
    memberships: Vec<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    inner: RwLock<DirectoryInner>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        info!("Initializing in-memory directory store");
        Self::default()
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectory {
    async fn create_user(&self, user: &User) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::DuplicateUsername(user.username.clone()));
        }
        inner.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn record_win(&self, user_id: Uuid) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(RepoError::UserNotFound(user_id))?;
        user.total_wins += 1;
        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<User>, RepoError> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| {
            b.total_wins
                .cmp(&a.total_wins)
                .then_with(|| a.username.cmp(&b.username))
        });
        users.truncate(limit);
        Ok(users)
    }

    async fn create_group(&self, group: &Group) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        if inner.groups.values().any(|g| g.name == group.name) {
            return Err(RepoError::DuplicateGroupName(group.name.clone()));
        }
        inner.groups.insert(group.group_id, group.clone());
        Ok(())
    }

    async fn get_group(&self, id: Uuid) -> Result<Option<Group>, RepoError> {
        Ok(self.inner.read().await.groups.get(&id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, RepoError> {
        let inner = self.inner.read().await;
        let mut groups: Vec<Group> = inner.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn add_member(&self, user_id: Uuid, group_id: Uuid) -> Result<bool, RepoError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(RepoError::UserNotFound(user_id));
        }
        if !inner.groups.contains_key(&group_id) {
            return Err(RepoError::GroupNotFound(group_id));
        }
        if inner.memberships.contains(&(user_id, group_id)) {
            return Ok(false);
        }
        inner.memberships.push((user_id, group_id));
        Ok(true)
    }

    async fn is_member(&self, user_id: Uuid, group_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .inner
            .read()
            .await
            .memberships
            .contains(&(user_id, group_id)))
    }

    async fn members_of(&self, group_id: Uuid) -> Result<Vec<User>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner
            .memberships
            .iter()
            .filter(|(_, g)| *g == group_id)
            .filter_map(|(u, _)| inner.users.get(u).cloned())
            .collect())
    }
}

#[derive(Default)]
struct GalleryInner {
    rounds: HashMap<Uuid, VotingRound>,
    images: HashMap<Uuid, GalleryImage>,
    votes: Vec<Vote>,
}

#[derive(Default)]
pub struct InMemoryGallery {
    inner: RwLock<GalleryInner>,
}

impl InMemoryGallery {
    pub fn new() -> Self {
        info!("Initializing in-memory gallery store");
        Self::default()
    }
}

// Round transitions share one write lock so a group can never hold two active
// rounds, even with completing votes in flight at the same time.
fn open_round_locked(inner: &mut GalleryInner, group_id: Uuid) -> Result<VotingRound, RepoError> {
    if inner
        .rounds
        .values()
        .any(|r| r.group_id == group_id && r.is_active())
    {
        return Err(RepoError::RoundStillActive(group_id));
    }
    let next_number = inner
        .rounds
        .values()
        .filter(|r| r.group_id == group_id)
        .map(|r| r.round_number)
        .max()
        .unwrap_or(0)
        + 1;
    let round = VotingRound {
        round_id: Uuid::new_v4(),
        group_id,
        round_number: next_number,
        started_at: Utc::now(),
        ended_at: None,
        winner_id: None,
        winning_image_id: None,
    };
    inner.rounds.insert(round.round_id, round.clone());
    info!(group_id = %group_id, round_number = next_number, "Opened voting round");
    Ok(round)
}

// Returns the group of the closed round so a successor can be opened for it.
fn close_round_locked(
    inner: &mut GalleryInner,
    round_id: Uuid,
    winner: Option<(Uuid, Uuid)>,
) -> Result<Uuid, RepoError> {
    let round = inner
        .rounds
        .get_mut(&round_id)
        .ok_or(RepoError::RoundNotFound(round_id))?;
    if !round.is_active() {
        return Err(RepoError::RoundAlreadyClosed(round_id));
    }
    round.ended_at = Some(Utc::now());
    if let Some((user_id, image_id)) = winner {
        round.winner_id = Some(user_id);
        round.winning_image_id = Some(image_id);
    }
    Ok(round.group_id)
}

#[async_trait]
impl GalleryRepository for InMemoryGallery {
    async fn open_round(&self, group_id: Uuid) -> Result<VotingRound, RepoError> {
        let mut inner = self.inner.write().await;
        open_round_locked(&mut inner, group_id)
    }

    async fn active_round(&self, group_id: Uuid) -> Result<Option<VotingRound>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rounds
            .values()
            .find(|r| r.group_id == group_id && r.is_active())
            .cloned())
    }

    async fn last_finished_round(
        &self,
        group_id: Uuid,
    ) -> Result<Option<VotingRound>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rounds
            .values()
            .filter(|r| r.group_id == group_id && !r.is_active())
            .max_by_key(|r| r.ended_at)
            .cloned())
    }

    async fn close_round(
        &self,
        round_id: Uuid,
        winner: Option<(Uuid, Uuid)>,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        close_round_locked(&mut inner, round_id, winner).map(|_| ())
    }

    async fn finish_round(
        &self,
        round_id: Uuid,
        winner: Option<(Uuid, Uuid)>,
    ) -> Result<VotingRound, RepoError> {
        let mut inner = self.inner.write().await;
        let group_id = close_round_locked(&mut inner, round_id, winner)?;
        open_round_locked(&mut inner, group_id)
    }

    async fn add_image(&self, image: &GalleryImage) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        inner.images.insert(image.image_id, image.clone());
        Ok(())
    }

    async fn get_image(&self, image_id: Uuid) -> Result<Option<GalleryImage>, RepoError> {
        Ok(self.inner.read().await.images.get(&image_id).cloned())
    }

    async fn round_images(&self, round_id: Uuid) -> Result<Vec<GalleryImage>, RepoError> {
        let inner = self.inner.read().await;
        let mut images: Vec<GalleryImage> = inner
            .images
            .values()
            .filter(|i| i.round_id == round_id)
            .cloned()
            .collect();
        images.sort_by(|a, b| {
            b.votes_count
                .cmp(&a.votes_count)
                .then_with(|| b.uploaded_at.cmp(&a.uploaded_at))
        });
        Ok(images)
    }

    async fn user_image_in_round(
        &self,
        user_id: Uuid,
        round_id: Uuid,
    ) -> Result<Option<GalleryImage>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner
            .images
            .values()
            .find(|i| i.uploader_id == user_id && i.round_id == round_id)
            .cloned())
    }

    async fn user_vote_in_round(
        &self,
        user_id: Uuid,
        round_id: Uuid,
    ) -> Result<Option<Vote>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner
            .votes
            .iter()
            .find(|v| v.user_id == user_id && v.round_id == round_id)
            .copied())
    }

    async fn cast_vote(
        &self,
        user_id: Uuid,
        image_id: Uuid,
        round_id: Uuid,
    ) -> Result<u32, RepoError> {
        let mut inner = self.inner.write().await;
        if inner
            .votes
            .iter()
            .any(|v| v.user_id == user_id && v.round_id == round_id)
        {
            return Err(RepoError::DuplicateVote { user_id, round_id });
        }
        if !inner.images.contains_key(&image_id) {
            return Err(RepoError::ImageNotFound(image_id));
        }
        inner.votes.push(Vote {
            user_id,
            image_id,
            round_id,
        });
        let image = inner
            .images
            .get_mut(&image_id)
            .ok_or(RepoError::ImageNotFound(image_id))?;
        image.votes_count += 1;
        Ok(image.votes_count)
    }

    async fn retract_vote(
        &self,
        user_id: Uuid,
        round_id: Uuid,
    ) -> Result<Option<(Uuid, u32)>, RepoError> {
        let mut inner = self.inner.write().await;
        let position = inner
            .votes
            .iter()
            .position(|v| v.user_id == user_id && v.round_id == round_id);
        let Some(position) = position else {
            return Ok(None);
        };
        let vote = inner.votes.remove(position);
        let image = inner
            .images
            .get_mut(&vote.image_id)
            .ok_or(RepoError::ImageNotFound(vote.image_id))?;
        image.votes_count = image.votes_count.saturating_sub(1);
        Ok(Some((vote.image_id, image.votes_count)))
    }

    async fn voters_in_round(&self, round_id: Uuid) -> Result<HashSet<Uuid>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner
            .votes
            .iter()
            .filter(|v| v.round_id == round_id)
            .map(|v| v.user_id)
            .collect())
    }
}
