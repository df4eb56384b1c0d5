//! The network half of the vote click handler.
//!
//! `VoteClient::send_vote` issues the vote request and classifies whatever
//! comes back into a `VoteOutcome`; `handle_click` ties the view model and
//! the client together, mirroring the click-to-patches flow end to end.
//! Requests carry no timeout and in-flight votes are not deduplicated: the
//! server is the sole arbiter, and the last outcome applied to the view wins.

use crate::models::VoteResponse;
use crate::view::{ClickAction, ClickTarget, GalleryView, Patch, SELF_VOTE_MESSAGE};
use reqwest::header;
use serde::Deserialize;
use uuid::Uuid;

/// Classified result of one vote request.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// 2xx with a parseable body; the body may still say `success: false`.
    Applied(VoteResponse),
    /// Non-2xx status; `message` comes from the body or is synthesized.
    Rejected { status: u16, message: String },
    /// The request never completed or the body was not valid JSON.
    Failed(String),
}

/// Error bodies only promise an optional `message`.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct VoteClient {
    http: reqwest::Client,
    base_url: String,
    user_id: Uuid,
}

impl VoteClient {
    pub fn new(base_url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user_id,
        }
    }

    /// POSTs a vote for `image_id` and classifies the response. The
    /// `X-Requested-With` header marks the request as script-originated so
    /// the server answers with JSON rather than a redirect.
    pub async fn send_vote(&self, image_id: Uuid) -> VoteOutcome {
        let url = format!(
            "{}/vote_image/{}",
            self.base_url.trim_end_matches('/'),
            image_id
        );
        tracing::debug!(%image_id, %url, "Sending vote request");

        let sent = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-User-Id", self.user_id.to_string())
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%image_id, error = %e, "Vote request failed to complete");
                return VoteOutcome::Failed(e.to_string());
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => classify_response(status, &body),
            Err(e) => VoteOutcome::Failed(e.to_string()),
        }
    }
}

/// Maps an HTTP status and raw body onto a `VoteOutcome`.
fn classify_response(status: u16, body: &str) -> VoteOutcome {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("HTTP error! status: {}", status));
        return VoteOutcome::Rejected { status, message };
    }

    match serde_json::from_str::<VoteResponse>(body) {
        Ok(resp) => VoteOutcome::Applied(resp),
        Err(e) => VoteOutcome::Failed(format!("invalid vote response body: {}", e)),
    }
}

/// The full click-to-patches flow: decide what the click means, send the
/// vote if one is due, and fold the outcome into the view.
pub async fn handle_click(
    view: &mut GalleryView,
    client: &VoteClient,
    target: ClickTarget,
) -> Vec<Patch> {
    match view.on_click(target) {
        ClickAction::Ignore => Vec::new(),
        ClickAction::RejectSelfVote => vec![Patch::Notify(SELF_VOTE_MESSAGE.to_string())],
        ClickAction::SubmitVote(image_id) => {
            let outcome = client.send_vote(image_id).await;
            view.apply(image_id, &outcome)
        }
    }
}
