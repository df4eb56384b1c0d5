use crate::{
    AppState,
    errors::{AppError, RepoError},
    models::{
        CreateGroupRequest, GalleryImage, Group, GroupDetail, GroupsOverview, ImageCard,
        LeaderboardEntry, MemberVoteStatus, PastWinner, RegisterRequest, User, VoteResponse,
        WinnerInfo,
    },
    rounds::{self, RoundOutcome},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Resolves the acting user from the `X-User-Id` header.
async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".to_string()))?;
    let user_id = Uuid::parse_str(raw)
        .map_err(|_| AppError::Unauthorized("Invalid X-User-Id header".to_string()))?;
    state
        .directory
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))
}

fn username_of(members: &[User], user_id: Uuid) -> String {
    members
        .iter()
        .find(|m| m.user_id == user_id)
        .map(|m| m.username.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn image_url(file_key: &str) -> String {
    format!("/images/{}", file_key)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::InvalidInput("Username cannot be empty.".to_string()));
    }

    let user = User {
        user_id: Uuid::new_v4(),
        username: username.to_string(),
        total_wins: 0,
    };
    state.directory.create_user(&user).await?;

    tracing::info!(user_id = %user.user_id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let user = require_user(&state, &headers).await?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Group name cannot be empty.".to_string()));
    }

    let group = Group {
        group_id: Uuid::new_v4(),
        name: name.to_string(),
        creator_id: user.user_id,
    };
    state.directory.create_group(&group).await?;
    // The creator joins automatically and the first round opens right away.
    state
        .directory
        .add_member(user.user_id, group.group_id)
        .await?;
    state.gallery.open_round(group.group_id).await?;

    tracing::info!(group_id = %group.group_id, name = %group.name, "Group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<GroupsOverview>, AppError> {
    require_user(&state, &headers).await?;
    let groups = state.directory.list_groups().await?;
    let leaderboard = state
        .directory
        .leaderboard(10)
        .await?
        .into_iter()
        .map(|u| LeaderboardEntry {
            username: u.username,
            total_wins: u.total_wins,
        })
        .collect();
    Ok(Json(GroupsOverview { groups, leaderboard }))
}

pub async fn join_group(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Group>, AppError> {
    let user = require_user(&state, &headers).await?;
    let group = state
        .directory
        .get_group(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {}", group_id)))?;

    let joined = state.directory.add_member(user.user_id, group_id).await?;
    if joined {
        tracing::info!(group_id = %group_id, user_id = %user.user_id, "Member joined group");
    } else {
        tracing::debug!(group_id = %group_id, user_id = %user.user_id, "Already a member");
    }
    Ok(Json(group))
}

pub async fn group_detail(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<GroupDetail>, AppError> {
    let user = require_user(&state, &headers).await?;
    let group = state
        .directory
        .get_group(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {}", group_id)))?;
    if !state.directory.is_member(user.user_id, group_id).await? {
        return Err(AppError::Forbidden(
            "You are not a member of this group.".to_string(),
        ));
    }

    let members = state.directory.members_of(group_id).await?;
    let min_members_met = members.len() >= state.config.min_round_members;

    let mut round = state.gallery.active_round(group_id).await?;
    // A group that lost its round (or just reached the minimum size) gets a
    // fresh one on the next visit.
    if round.is_none() && min_members_met {
        round = match state.gallery.open_round(group_id).await {
            Ok(opened) => Some(opened),
            // Another request opened it first; use theirs.
            Err(RepoError::RoundStillActive(_)) => state.gallery.active_round(group_id).await?,
            Err(e) => return Err(e.into()),
        };
    }

    let mut images = Vec::new();
    let mut already_uploaded = false;
    let mut voters = Default::default();
    if let Some(round) = &round {
        let user_vote = state
            .gallery
            .user_vote_in_round(user.user_id, round.round_id)
            .await?;
        already_uploaded = state
            .gallery
            .user_image_in_round(user.user_id, round.round_id)
            .await?
            .is_some();
        for img in state.gallery.round_images(round.round_id).await? {
            images.push(ImageCard {
                image_id: img.image_id,
                file_url: image_url(&img.file_key),
                uploader_name: username_of(&members, img.uploader_id),
                uploaded_at: img.uploaded_at,
                votes: img.votes_count,
                has_voted: user_vote.is_some_and(|v| v.image_id == img.image_id),
                is_uploader: img.uploader_id == user.user_id,
            });
        }
        voters = state.gallery.voters_in_round(round.round_id).await?;
    }

    let member_vote_statuses = members
        .iter()
        .map(|m| MemberVoteStatus {
            username: m.username.clone(),
            has_voted: voters.contains(&m.user_id),
        })
        .collect();

    let past_winner = match state.gallery.last_finished_round(group_id).await? {
        Some(finished) => match (finished.winner_id, finished.winning_image_id) {
            (Some(winner_id), Some(winning_image_id)) => {
                let winner_name = username_of(&members, winner_id);
                let winning_image = state.gallery.get_image(winning_image_id).await?;
                let votes = winning_image.as_ref().map(|i| i.votes_count).unwrap_or(0);
                let message =
                    format!("The winner for this round is {} with {} votes!", winner_name, votes);
                Some(PastWinner {
                    round_number: finished.round_number,
                    winner: Some(WinnerInfo {
                        username: winner_name,
                        votes,
                        image_id: winning_image_id,
                        image_url: winning_image
                            .map(|i| image_url(&i.file_key))
                            .unwrap_or_default(),
                        message: message.clone(),
                    }),
                    message,
                })
            }
            _ => Some(PastWinner {
                round_number: finished.round_number,
                winner: None,
                message: "No winner determined for the last round (it might have been a tie or no votes)."
                    .to_string(),
            }),
        },
        None => None,
    };

    Ok(Json(GroupDetail {
        round_number: round.as_ref().map(|r| r.round_number).unwrap_or(0),
        group,
        images,
        member_vote_statuses,
        min_members_met,
        already_uploaded,
        past_winner,
    }))
}

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<GalleryImage>), AppError> {
    let user = require_user(&state, &headers).await?;
    state
        .directory
        .get_group(group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group {}", group_id)))?;
    if !state.directory.is_member(user.user_id, group_id).await? {
        return Err(AppError::Forbidden(
            "You are not a member of this group.".to_string(),
        ));
    }

    let members = state.directory.members_of(group_id).await?;
    if members.len() < state.config.min_round_members {
        return Err(AppError::InvalidInput(format!(
            "Cannot upload image. Group needs at least {} members to start a voting round.",
            state.config.min_round_members
        )));
    }
    let round = state
        .gallery
        .active_round(group_id)
        .await?
        .ok_or_else(|| AppError::VotingClosed("Cannot upload image. No active voting round.".to_string()))?;
    if state
        .gallery
        .user_image_in_round(user.user_id, round.round_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "You can only upload one image per round to this group.".to_string(),
        ));
    }

    let mut image_data: Option<Vec<u8>> = None;
    let mut image_filename: Option<String> = None;
    let mut image_content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "image" => {
                image_filename = field.file_name().map(|s| s.to_string());
                image_content_type = field.content_type().map(|m| m.to_string());
                image_data = Some(field.bytes().await?.to_vec());
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    let image_data = image_data.ok_or_else(|| AppError::MissingFormField("image".to_string()))?;
    if image_data.is_empty() {
        return Err(AppError::InvalidInput("image data cannot be empty".to_string()));
    }

    let extension = image_filename
        .as_ref()
        .and_then(|name| name.split('.').next_back().map(|ext| ext.to_lowercase()))
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::InvalidInput("Invalid file type. Allowed: png, jpg, jpeg, gif".to_string())
        })?;

    let image_id = Uuid::new_v4();
    let file_key = format!("{}.{}", image_id, extension);
    let final_content_type = image_content_type
        .or_else(|| mime_guess::from_path(&file_key).first_raw().map(String::from));

    state
        .files
        .upload(&file_key, image_data, final_content_type)
        .await?;

    let image = GalleryImage {
        image_id,
        group_id,
        round_id: round.round_id,
        uploader_id: user.user_id,
        file_key,
        uploaded_at: Utc::now(),
        votes_count: 0,
    };
    state.gallery.add_image(&image).await?;

    tracing::info!(image_id = %image_id, group_id = %group_id, "Image uploaded");
    Ok((StatusCode::CREATED, Json(image)))
}

/// Handler for GET /images/{key}
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    tracing::debug!(file_key = %key, "Fetching image file via handler");

    let (data, content_type) = state.files.download(&key).await?;
    let content_type_header = content_type.as_deref().unwrap_or("application/octet-stream");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_header)
        .body(Body::from(data))
        .map_err(|e| AppError::InternalServerError(format!("Failed to build image response: {}", e)))?;
    Ok(response)
}

/// Handler for POST /vote_image/{image_id}.
///
/// Applies exactly one of unvote / transfer / new vote, ends the round early
/// once every member has voted, and reports the member statuses of the round
/// the vote was cast in.
pub async fn vote_image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<VoteResponse>, AppError> {
    let user = require_user(&state, &headers).await?;
    let image = state
        .gallery
        .get_image(image_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {}", image_id)))?;

    let round = state
        .gallery
        .active_round(image.group_id)
        .await?
        .ok_or_else(|| {
            AppError::VotingClosed(
                "No active voting round. Please wait for a new round to begin.".to_string(),
            )
        })?;

    if !state
        .directory
        .is_member(user.user_id, image.group_id)
        .await?
    {
        return Err(AppError::Forbidden(
            "You are not a member of this group.".to_string(),
        ));
    }
    if image.uploader_id == user.user_id {
        return Err(AppError::Forbidden(
            "You cannot vote on your own image.".to_string(),
        ));
    }
    if image.round_id != round.round_id {
        return Err(AppError::VotingClosed(
            "Voting for this period has ended for this image.".to_string(),
        ));
    }

    let existing = state
        .gallery
        .user_vote_in_round(user.user_id, round.round_id)
        .await?;

    let mut message;
    let votes_count;
    let has_voted;
    let mut old_voted_image_id = None;
    let mut old_votes_count = None;

    match existing {
        // Voting the held image again retracts the vote.
        Some(vote) if vote.image_id == image_id => {
            let (_, tally) = state
                .gallery
                .retract_vote(user.user_id, round.round_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalServerError("Vote disappeared while unvoting".to_string())
                })?;
            votes_count = tally;
            has_voted = false;
            message = "Vote removed successfully!".to_string();
        }
        // Vote transfer: only one active vote per member per round.
        Some(_) => {
            if let Some((old_id, old_tally)) = state
                .gallery
                .retract_vote(user.user_id, round.round_id)
                .await?
            {
                old_voted_image_id = Some(old_id);
                old_votes_count = Some(old_tally);
            }
            votes_count = state
                .gallery
                .cast_vote(user.user_id, image_id, round.round_id)
                .await?;
            has_voted = true;
            message = "Vote changed successfully!".to_string();
        }
        None => {
            votes_count = state
                .gallery
                .cast_vote(user.user_id, image_id, round.round_id)
                .await?;
            has_voted = true;
            message = "Image liked!".to_string();
        }
    }

    let members = state.directory.members_of(image.group_id).await?;
    let member_ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
    let voters = state.gallery.voters_in_round(round.round_id).await?;

    let mut game_ended_early = false;
    let mut winner_info = None;
    if rounds::round_complete(&member_ids, &voters, state.config.min_round_members) {
        let images = state.gallery.round_images(round.round_id).await?;
        let outcome = rounds::determine_outcome(&images);
        let winner = match &outcome {
            RoundOutcome::Winner {
                user_id, image_id, ..
            } => Some((*user_id, *image_id)),
            _ => None,
        };
        // Ending the round and opening the next is one store transition, and
        // of concurrent completing votes only one request gets to perform it.
        match state.gallery.finish_round(round.round_id, winner).await {
            Ok(_) => {
                game_ended_early = true;
                let summary = match outcome {
                    RoundOutcome::Winner {
                        user_id,
                        image_id: winning_image_id,
                        votes,
                    } => {
                        state.directory.record_win(user_id).await?;
                        let username = username_of(&members, user_id);
                        let file_key = images
                            .iter()
                            .find(|i| i.image_id == winning_image_id)
                            .map(|i| i.file_key.clone())
                            .unwrap_or_default();
                        let info = WinnerInfo {
                            message: format!(
                                "The winner for this round is {} with {} votes!",
                                username, votes
                            ),
                            username,
                            votes,
                            image_id: winning_image_id,
                            image_url: image_url(&file_key),
                        };
                        let text = info.message.clone();
                        winner_info = Some(info);
                        text
                    }
                    RoundOutcome::Tie { votes, uploader_ids } => {
                        let names: Vec<String> = uploader_ids
                            .iter()
                            .map(|id| username_of(&members, *id))
                            .collect();
                        format!(
                            "It's a tie with {} votes! Participants: {}",
                            votes,
                            names.join(", ")
                        )
                    }
                    RoundOutcome::NoVotes => {
                        "No votes were cast for any image this round.".to_string()
                    }
                    RoundOutcome::NoImages => {
                        "No images were uploaded for this round.".to_string()
                    }
                };
                message = format!("All members have voted! Round ended. {}", summary);
                tracing::info!(group_id = %image.group_id, round_id = %round.round_id, "Round ended early");
            }
            // Another request finished the round first; the vote itself
            // stands, only the closing bookkeeping is skipped.
            Err(RepoError::RoundAlreadyClosed(_)) => {
                tracing::debug!(round_id = %round.round_id, "Round already finished by a concurrent vote");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Statuses are reported against the round the vote was cast in, even
    // when that round just ended.
    let member_vote_statuses: Vec<MemberVoteStatus> = members
        .iter()
        .map(|m| MemberVoteStatus {
            username: m.username.clone(),
            has_voted: voters.contains(&m.user_id),
        })
        .collect();

    tracing::info!(
        image_id = %image_id,
        user_id = %user.user_id,
        votes_count,
        has_voted,
        game_ended_early,
        "Vote processed"
    );

    Ok(Json(VoteResponse {
        success: true,
        message: Some(message),
        votes_count,
        has_voted,
        old_voted_image_id,
        old_votes_count,
        member_vote_statuses: Some(member_vote_statuses),
        game_ended_early,
        winner_info,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use crate::repositories::{InMemoryDirectory, InMemoryGallery};
    use crate::storage::LocalFileStorage;

    pub(crate) fn test_state() -> Arc<AppState> {
        let upload_dir =
            std::env::temp_dir().join(format!("photovote-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&upload_dir).expect("create upload dir");
        Arc::new(AppState {
            directory: Arc::new(InMemoryDirectory::new()),
            gallery: Arc::new(InMemoryGallery::new()),
            files: Arc::new(LocalFileStorage::new(upload_dir)),
            config: Config::default(),
        })
    }

    pub(crate) fn headers_for(user: &User) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", user.user_id.to_string().parse().unwrap());
        headers
    }

    /// Registers `names`, creates a group owned by the first and joins the
    /// rest. The first round is open but no images exist yet.
    pub(crate) async fn seed_members(
        state: &Arc<AppState>,
        names: &[&str],
    ) -> (Group, Vec<User>) {
        let mut users = Vec::new();
        for name in names {
            let (_, Json(user)) = register(
                State(state.clone()),
                Json(RegisterRequest {
                    username: name.to_string(),
                }),
            )
            .await
            .unwrap();
            users.push(user);
        }

        let (_, Json(group)) = create_group(
            State(state.clone()),
            headers_for(&users[0]),
            Json(CreateGroupRequest {
                name: "pet pics".to_string(),
            }),
        )
        .await
        .unwrap();
        for user in &users[1..] {
            join_group(
                State(state.clone()),
                Path(group.group_id),
                headers_for(user),
            )
            .await
            .unwrap();
        }

        (group, users)
    }

    /// Like `seed_members`, but also gives each member one image in the
    /// active round.
    pub(crate) async fn seed_group(
        state: &Arc<AppState>,
        names: &[&str],
    ) -> (Group, Vec<User>, Vec<GalleryImage>) {
        let (group, users) = seed_members(state, names).await;
        let round = state
            .gallery
            .active_round(group.group_id)
            .await
            .unwrap()
            .unwrap();
        let mut images = Vec::new();
        for user in &users {
            let image = GalleryImage {
                image_id: Uuid::new_v4(),
                group_id: group.group_id,
                round_id: round.round_id,
                uploader_id: user.user_id,
                file_key: format!("{}.png", Uuid::new_v4()),
                uploaded_at: Utc::now(),
                votes_count: 0,
            };
            state.gallery.add_image(&image).await.unwrap();
            images.push(image);
        }

        (group, users, images)
    }

    async fn vote(
        state: &Arc<AppState>,
        voter: &User,
        image_id: Uuid,
    ) -> Result<VoteResponse, AppError> {
        vote_image(State(state.clone()), Path(image_id), headers_for(voter))
            .await
            .map(|Json(resp)| resp)
    }

    const BOUNDARY: &str = "x-test-form-boundary";

    async fn multipart(field: &str, filename: &str, bytes: &[u8]) -> Multipart {
        use axum::extract::FromRequest;

        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; \
             name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = axum::http::Request::builder()
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    async fn upload(
        state: &Arc<AppState>,
        group_id: Uuid,
        uploader: &User,
        field: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<GalleryImage, AppError> {
        upload_image(
            State(state.clone()),
            Path(group_id),
            headers_for(uploader),
            multipart(field, filename, bytes).await,
        )
        .await
        .map(|(_, Json(image))| image)
    }

    #[tokio::test]
    async fn upload_stores_the_file_once_per_round() {
        let state = test_state();
        let (group, users) = seed_members(&state, &["alice", "bob", "carol"]).await;

        let image = upload(&state, group.group_id, &users[0], "image", "cat.png", b"pngdata")
            .await
            .unwrap();
        assert_eq!(image.group_id, group.group_id);
        assert_eq!(image.uploader_id, users[0].user_id);
        assert_eq!(image.votes_count, 0);
        assert!(image.file_key.ends_with(".png"));

        let (data, content_type) = state.files.download(&image.file_key).await.unwrap();
        assert_eq!(data, b"pngdata");
        assert_eq!(content_type.as_deref(), Some("image/png"));

        // The same member cannot enter a second image this round.
        let err = upload(&state, group.group_id, &users[0], "image", "dog.jpg", b"jpgdata")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // Another member still can.
        upload(&state, group.group_id, &users[1], "image", "dog.jpg", b"jpgdata")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_file_types() {
        let state = test_state();
        let (group, users) = seed_members(&state, &["alice", "bob", "carol"]).await;

        for filename in ["notes.txt", "clip.mp4", "noextension"] {
            let err = upload(&state, group.group_id, &users[0], "image", filename, b"data")
                .await
                .unwrap_err();
            assert!(
                matches!(&err, AppError::InvalidInput(msg) if msg.contains("Invalid file type")),
                "filename {:?} got {:?}",
                filename,
                err
            );
        }
    }

    #[tokio::test]
    async fn upload_without_image_field_is_rejected() {
        let state = test_state();
        let (group, users) = seed_members(&state, &["alice", "bob", "carol"]).await;

        let err = upload(&state, group.group_id, &users[0], "attachment", "cat.png", b"pngdata")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingFormField(field) if field == "image"));
    }

    #[tokio::test]
    async fn upload_with_empty_file_is_rejected() {
        let state = test_state();
        let (group, users) = seed_members(&state, &["alice", "bob", "carol"]).await;

        let err = upload(&state, group.group_id, &users[0], "image", "cat.png", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn upload_below_member_minimum_is_rejected() {
        let state = test_state();
        let (group, users) = seed_members(&state, &["alice", "bob"]).await;

        let err = upload(&state, group.group_id, &users[0], "image", "cat.png", b"pngdata")
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::InvalidInput(msg) if msg.contains("at least")));
    }

    #[tokio::test]
    async fn vote_then_unvote_adjusts_the_tally() {
        let state = test_state();
        let (_, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;

        let resp = vote(&state, &users[1], images[0].image_id).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.votes_count, 1);
        assert!(resp.has_voted);
        assert_eq!(resp.message.as_deref(), Some("Image liked!"));

        let resp = vote(&state, &users[1], images[0].image_id).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.votes_count, 0);
        assert!(!resp.has_voted);
        assert!(resp.message.unwrap().contains("removed"));
    }

    #[tokio::test]
    async fn changing_a_vote_reports_the_old_image() {
        let state = test_state();
        let (_, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;

        vote(&state, &users[1], images[0].image_id).await.unwrap();
        let resp = vote(&state, &users[1], images[2].image_id).await.unwrap();

        assert!(resp.success);
        assert_eq!(resp.votes_count, 1);
        assert!(resp.has_voted);
        assert_eq!(resp.old_voted_image_id, Some(images[0].image_id));
        assert_eq!(resp.old_votes_count, Some(0));
    }

    #[tokio::test]
    async fn self_vote_is_forbidden() {
        let state = test_state();
        let (_, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;

        let err = vote(&state, &users[0], images[0].image_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(err.to_string(), "You cannot vote on your own image.");
    }

    #[tokio::test]
    async fn non_member_cannot_vote() {
        let state = test_state();
        let (_, _, images) = seed_group(&state, &["alice", "bob", "carol"]).await;
        let (_, Json(outsider)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                username: "mallory".to_string(),
            }),
        )
        .await
        .unwrap();

        let err = vote(&state, &outsider, images[0].image_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn vote_without_active_round_is_rejected() {
        let state = test_state();
        let (group, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;
        let round = state
            .gallery
            .active_round(group.group_id)
            .await
            .unwrap()
            .unwrap();
        state.gallery.close_round(round.round_id, None).await.unwrap();

        let err = vote(&state, &users[1], images[0].image_id).await.unwrap_err();
        assert!(matches!(err, AppError::VotingClosed(_)));
        assert!(err.to_string().contains("No active voting round"));
    }

    #[tokio::test]
    async fn image_from_a_previous_round_is_rejected() {
        let state = test_state();
        let (group, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;
        let round = state
            .gallery
            .active_round(group.group_id)
            .await
            .unwrap()
            .unwrap();
        state.gallery.close_round(round.round_id, None).await.unwrap();
        state.gallery.open_round(group.group_id).await.unwrap();

        let err = vote(&state, &users[1], images[0].image_id).await.unwrap_err();
        assert!(matches!(err, AppError::VotingClosed(_)));
        assert!(err.to_string().contains("Voting for this period has ended"));
    }

    #[tokio::test]
    async fn last_vote_ends_the_round_and_crowns_a_winner() {
        let state = test_state();
        let (group, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;

        // bob and carol vote for alice's image; alice votes for bob's.
        vote(&state, &users[1], images[0].image_id).await.unwrap();
        vote(&state, &users[2], images[0].image_id).await.unwrap();
        let resp = vote(&state, &users[0], images[1].image_id).await.unwrap();

        assert!(resp.game_ended_early);
        let winner = resp.winner_info.unwrap();
        assert_eq!(winner.username, "alice");
        assert_eq!(winner.votes, 2);
        assert_eq!(winner.image_id, images[0].image_id);
        assert!(resp.message.unwrap().starts_with("All members have voted!"));

        // The winner's global tally moved and a fresh round is open.
        let alice = state
            .directory
            .get_user(users[0].user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.total_wins, 1);
        let next = state
            .gallery
            .active_round(group.group_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.round_number, 2);

        // Statuses describe the round the vote was cast in: everyone voted.
        let statuses = resp.member_vote_statuses.unwrap();
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(|s| s.has_voted));
    }

    #[tokio::test]
    async fn tied_round_ends_without_a_winner() {
        let state = test_state();
        let (_, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;

        // One vote each for three different images: a three-way tie.
        vote(&state, &users[1], images[0].image_id).await.unwrap();
        vote(&state, &users[2], images[1].image_id).await.unwrap();
        let resp = vote(&state, &users[0], images[2].image_id).await.unwrap();

        assert!(resp.game_ended_early);
        assert!(resp.winner_info.is_none());
        assert!(resp.message.unwrap().contains("tie"));
    }

    #[tokio::test]
    async fn statuses_follow_membership_order() {
        let state = test_state();
        let (_, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;

        let resp = vote(&state, &users[2], images[0].image_id).await.unwrap();
        let statuses = resp.member_vote_statuses.unwrap();
        let summary: Vec<(&str, bool)> = statuses
            .iter()
            .map(|s| (s.username.as_str(), s.has_voted))
            .collect();
        assert_eq!(
            summary,
            vec![("alice", false), ("bob", false), ("carol", true)]
        );
    }

    #[tokio::test]
    async fn round_stays_open_until_everyone_votes() {
        let state = test_state();
        let (group, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;
        // Carol's vote is what would complete the round; stop short of it.
        vote(&state, &users[0], images[1].image_id).await.unwrap();
        let resp = vote(&state, &users[1], images[0].image_id).await.unwrap();
        assert!(!resp.game_ended_early);
        assert!(
            state
                .gallery
                .active_round(group.group_id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn too_few_members_never_end_the_round() {
        let state = test_state();
        let (group, users, images) = seed_group(&state, &["alice", "bob"]).await;

        vote(&state, &users[0], images[1].image_id).await.unwrap();
        let resp = vote(&state, &users[1], images[0].image_id).await.unwrap();

        // Everyone voted, but two members is below the minimum of three.
        assert!(!resp.game_ended_early);
        let round = state
            .gallery
            .active_round(group.group_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(round.round_number, 1);
    }

    #[tokio::test]
    async fn group_detail_reflects_viewer_perspective() {
        let state = test_state();
        let (group, users, images) = seed_group(&state, &["alice", "bob", "carol"]).await;
        vote(&state, &users[1], images[0].image_id).await.unwrap();

        let Json(detail) = group_detail(
            State(state.clone()),
            Path(group.group_id),
            headers_for(&users[1]),
        )
        .await
        .unwrap();

        assert_eq!(detail.round_number, 1);
        assert!(detail.min_members_met);
        assert!(detail.already_uploaded);
        assert_eq!(detail.images.len(), 3);

        // Highest tally first; bob's perspective flags are set.
        assert_eq!(detail.images[0].image_id, images[0].image_id);
        assert!(detail.images[0].has_voted);
        assert!(!detail.images[0].is_uploader);
        let own = detail
            .images
            .iter()
            .find(|c| c.image_id == images[1].image_id)
            .unwrap();
        assert!(own.is_uploader);
    }
}
