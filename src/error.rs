//! Error types
//!
//! [`GameError`] covers validation and state conflicts raised by the game
//! engine, [`CatalogError`] covers question loading. [`ApiError`] wraps both
//! for the HTTP layer and renders them as JSON.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::types::{CategoryId, GroupId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("unknown category '{0}'")]
    UnknownCategory(CategoryId),

    #[error("unknown category group '{0}'")]
    UnknownGroup(GroupId),

    #[error("too few questions to start a game")]
    InsufficientQuestions,

    #[error("round duration must be positive, got {0}s")]
    InvalidDuration(i64),

    #[error("'{0}' is not a valid vote")]
    InvalidVote(String),

    #[error("already voted this round")]
    AlreadyVoted,

    #[error("no game running")]
    NoGame,

    #[error("no round open")]
    RoundNotOpen,

    #[error("a game is already running")]
    GameInProgress,

    #[error("game already completed")]
    GameCompleted,
}

impl GameError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownCategory(_) => "UNKNOWN_CATEGORY",
            Self::UnknownGroup(_) => "UNKNOWN_GROUP",
            Self::InsufficientQuestions => "INSUFFICIENT_QUESTIONS",
            Self::InvalidDuration(_) => "INVALID_DURATION",
            Self::InvalidVote(_) => "INVALID_VOTE",
            Self::AlreadyVoted => "ALREADY_VOTED",
            Self::NoGame => "NO_GAME",
            Self::RoundNotOpen => "ROUND_NOT_OPEN",
            Self::GameInProgress => "GAME_IN_PROGRESS",
            Self::GameCompleted => "GAME_COMPLETED",
        }
    }

    /// Validation errors are about the request, everything else about state
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownCategory(_)
                | Self::UnknownGroup(_)
                | Self::InsufficientQuestions
                | Self::InvalidDuration(_)
                | Self::InvalidVote(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog contains no usable categories")]
    Empty,

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid media data: {0}")]
    Media(#[from] base64::DecodeError),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Game(e) if e.is_validation() => (StatusCode::BAD_REQUEST, e.code()),
            Self::Game(e) => (StatusCode::CONFLICT, e.code()),
            Self::Catalog(CatalogError::Empty) => (StatusCode::BAD_REQUEST, "EMPTY_CATALOG"),
            Self::Catalog(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CATALOG_ERROR"),
        };

        let body = serde_json::json!({
            "error": code,
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
