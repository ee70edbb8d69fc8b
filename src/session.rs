use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tower_sessions::Session;

use crate::{users::User, AppError, AppResult, AppState};

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";

/// The authenticated member a request acts for, with the token that proved
/// it. Handlers pass this explicitly to everything below them.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub access_token: String,
}

impl Actor {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.user.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("administrator access required".to_owned()))
        }
    }
}

/// A bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

/// The access token for this request: the bearer header first, then the one
/// stored in the cookie session at sign-in.
pub async fn access_token(parts: &mut Parts, state: &AppState) -> AppResult<Option<String>> {
    if let Some(token) = bearer_token(&parts.headers) {
        return Ok(Some(token));
    }

    let session = Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| AppError::Internal(msg.to_owned()))?;
    Ok(session.get::<String>(ACCESS_TOKEN).await?)
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let Some(access_token) = access_token(parts, state).await? else {
            return Err(AppError::AuthenticationFailed("Access token required".to_owned()));
        };

        let user = User::from_gateway(&state.gateway.current_user(&access_token).await?);

        if !user.is_active {
            tracing::info!(user_id = %user.id, "suspended account refused");
            return Err(AppError::Forbidden("this account has been suspended".to_owned()));
        }

        Ok(Actor { user, access_token })
    }
}
