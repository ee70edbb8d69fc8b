use std::sync::Arc;

use axum::{debug_handler, extract::State, http::HeaderMap, Json};
use serde::Serialize;
use tower_sessions::Session;

use crate::{
    session::{bearer_token, ACCESS_TOKEN},
    users::IdentityGateway,
    AppError, AppResult, AppState,
};

#[derive(Serialize)]
pub(crate) struct SignedOut {
    message: &'static str,
}

#[debug_handler(state = AppState)]
pub(crate) async fn signout(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    headers: HeaderMap,
    session: Session,
) -> AppResult<Json<SignedOut>> {
    let token = match bearer_token(&headers) {
        Some(token) => Some(token),
        None => session.get::<String>(ACCESS_TOKEN).await?,
    };
    session.clear().await;

    if let Some(token) = token {
        match gateway.sign_out(&token).await {
            // already expired or revoked
            Ok(()) | Err(AppError::AuthenticationFailed(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(Json(SignedOut { message: "Signed out successfully" }))
}
