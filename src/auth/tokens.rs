use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    appresult::Payload,
    session::REFRESH_TOKEN,
    users::{AuthSession, IdentityGateway},
    AppError, AppResult, AppState,
};

use super::{normalize_email, remember};

#[derive(Deserialize)]
pub(crate) struct RefreshBody {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct Refreshed {
    message: &'static str,
    session: AuthSession,
}

#[derive(Deserialize)]
pub(crate) struct ResetBody {
    email: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ResetSent {
    message: &'static str,
}

#[debug_handler(state = AppState)]
pub(crate) async fn refresh(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    session: Session,

    Payload(RefreshBody { refresh_token }): Payload<RefreshBody>,
) -> AppResult<Json<Refreshed>> {
    let refresh_token = match refresh_token.filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => session
            .get::<String>(REFRESH_TOKEN)
            .await?
            .ok_or_else(|| AppError::validation("Refresh token is required"))?,
    };

    let auth = gateway.refresh(&refresh_token).await?;
    remember(&session, &auth).await?;

    Ok(Json(Refreshed {
        message: "Token refreshed successfully",
        session: auth,
    }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reset_password(
    State(gateway): State<Arc<dyn IdentityGateway>>,

    Payload(ResetBody { email }): Payload<ResetBody>,
) -> AppResult<Json<ResetSent>> {
    let email = normalize_email(email).ok_or_else(|| AppError::validation("Email is required"))?;
    gateway.reset_password(&email).await?;

    Ok(Json(ResetSent { message: "Password reset email sent" }))
}
