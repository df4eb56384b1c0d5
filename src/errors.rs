use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

// --- Domain/Infrastructure Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("User not found with ID: {0}")]
    UserNotFound(Uuid),

    #[error("Group not found with ID: {0}")]
    GroupNotFound(Uuid),

    #[error("Image not found with ID: {0}")]
    ImageNotFound(Uuid),

    #[error("Round not found with ID: {0}")]
    RoundNotFound(Uuid),

    #[error("Group {0} already has an active round")]
    RoundStillActive(Uuid),

    #[error("Round {0} is already closed")]
    RoundAlreadyClosed(Uuid),

    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    #[error("Group name already taken: {0}")]
    DuplicateGroupName(String),

    #[error("User {user_id} already has a vote in round {round_id}")]
    DuplicateVote { user_id: Uuid, round_id: Uuid },

    #[error("Store backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found with key: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Input validation / request parsing errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Missing form field: {0}")]
    MissingFormField(String),
    #[error("Error processing multipart form data: {0}")]
    MultipartError(#[from] axum::extract::multipart::MultipartError),
    #[error("Invalid ID format: {0}")]
    InvalidUuid(#[from] uuid::Error),

    // Request-level rejections
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    VotingClosed(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),

    // Domain/Service level errors (mapped from RepoError/StorageError)
    #[error("Could not access vote data")]
    RepositoryError(#[source] RepoError),
    #[error("Could not perform file storage operation")]
    StorageError(#[source] StorageError),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // Generic Internal Server Error
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

// --- Conversions from Domain Errors to AppError ---

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::UserNotFound(id) => AppError::NotFound(format!("User {}", id)),
            RepoError::GroupNotFound(id) => AppError::NotFound(format!("Group {}", id)),
            RepoError::ImageNotFound(id) => AppError::NotFound(format!("Image {}", id)),
            RepoError::RoundNotFound(id) => AppError::NotFound(format!("Round {}", id)),
            RepoError::DuplicateUsername(name) => {
                AppError::Conflict(format!("Username '{}' is already taken.", name))
            }
            RepoError::DuplicateGroupName(name) => {
                AppError::Conflict(format!("A group with the name '{}' already exists.", name))
            }
            RepoError::RoundStillActive(id) => AppError::Conflict(format!(
                "Group {} already has an active voting round.",
                id
            )),
            RepoError::RoundAlreadyClosed(id) => {
                AppError::Conflict(format!("Round {} has already ended.", id))
            }
            e @ RepoError::DuplicateVote { .. } => AppError::RepositoryError(e),
            e @ RepoError::BackendError(_) => AppError::RepositoryError(e),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File '{}'", key)),
            e => AppError::StorageError(e),
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            // 4xx Client Errors
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MissingFormField(field) => (
                StatusCode::BAD_REQUEST,
                format!("Missing form field: {}", field),
            ),
            AppError::MultipartError(e) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid multipart form data: {}", e),
            ),
            AppError::InvalidUuid(e) => {
                (StatusCode::BAD_REQUEST, format!("Invalid ID format: {}", e))
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::VotingClosed(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),

            // 5xx Server Errors
            AppError::RepositoryError(e) => {
                tracing::error!(error.source = ?e, "Repository error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Vote data operation failed".to_string(),
                )
            }
            AppError::StorageError(e) => {
                tracing::error!(error.source = ?e, "Storage error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "File storage operation failed".to_string(),
                )
            }
            AppError::ConfigError(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }
            AppError::IoError(e) => {
                tracing::error!("I/O error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        tracing::error!(error.message = %error_message, error.detail = %self, "Responding with error");

        // The vote handler reads `message` out of error bodies, so every
        // error response carries the same shape as an application rejection.
        let body = Json(serde_json::json!({ "success": false, "message": error_message }));
        (status, body).into_response()
    }
}
