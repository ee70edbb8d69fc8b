use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::swaps::SwapStatus;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a request can end in. Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("you cannot request a swap with yourself")]
    SelfSwapNotAllowed,

    #[error("you do not offer {0:?}")]
    SkillNotOffered(String),

    #[error("{0:?} is not offered by that member")]
    SkillNotAvailable(String),

    #[error("that profile is not open to swap requests")]
    ProfileNotBrowsable,

    #[error("cannot move a swap from {from} to {to}")]
    InvalidTransition { from: SwapStatus, to: SwapStatus },

    #[error("the swap was changed by someone else, reload and try again")]
    Conflict,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("you cannot review this swap")]
    ReviewNotAllowed,

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("identity provider error: {0}")]
    Gateway(String),

    #[error("identity provider unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable kind, sent next to the human message.
    pub fn code(&self) -> &'static str {
        use AppError::*;
        match self {
            Validation(_) => "validation_error",
            SelfSwapNotAllowed => "self_swap_not_allowed",
            SkillNotOffered(_) => "skill_not_offered",
            SkillNotAvailable(_) => "skill_not_available",
            ProfileNotBrowsable => "profile_not_browsable",
            InvalidTransition { .. } => "invalid_transition",
            Conflict => "conflict",
            NotFound(_) => "not_found",
            ReviewNotAllowed => "review_not_allowed",
            AuthenticationFailed(_) => "authentication_failed",
            Forbidden(_) => "forbidden",
            Store(_) | Migrate(_) | Gateway(_) | Http(_) => "network_or_store_error",
            Session(_) | Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Validation(_) => StatusCode::BAD_REQUEST,
            SelfSwapNotAllowed | SkillNotOffered(_) | SkillNotAvailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ProfileNotBrowsable | ReviewNotAllowed | Forbidden(_) => StatusCode::FORBIDDEN,
            InvalidTransition { .. } | Conflict => StatusCode::CONFLICT,
            NotFound(_) => StatusCode::NOT_FOUND,
            AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Gateway(_) | Http(_) => StatusCode::BAD_GATEWAY,
            Migrate(_) | Session(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Store and gateway failures are worth another attempt by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Gateway(_) | Self::Http(_))
    }
}

/// A JSON request body. Malformed or mistyped bodies become
/// [`AppError::Validation`] instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct Payload<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
            if self.is_retryable() {
                "Service temporarily unavailable, please retry".to_owned()
            } else {
                "Internal server error".to_owned()
            }
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
