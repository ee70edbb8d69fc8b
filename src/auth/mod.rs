mod account;
mod login;
mod logout;
mod signup;
mod tokens;

use axum::{routing::{get, post, put}, Router};
use tower_sessions::Session;

use crate::{
    session::{ACCESS_TOKEN, REFRESH_TOKEN},
    users::AuthSession,
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup::signup))
        .route("/signin", post(login::signin))
        .route("/signout", post(logout::signout))
        .route("/me", get(account::me))
        .route("/profile", put(account::update_profile))
        .route("/refresh", post(tokens::refresh))
        .route("/reset-password", post(tokens::reset_password))
}

/// Addresses are looked up case-insensitively.
pub(crate) fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

pub(crate) fn credentials(email: Option<String>, password: Option<String>) -> AppResult<(String, String)> {
    match (normalize_email(email), password.filter(|p| !p.is_empty())) {
        (Some(email), Some(password)) => {
            if !email.contains('@') {
                return Err(AppError::validation("Email address is not valid"));
            }
            Ok((email, password))
        }
        _ => Err(AppError::validation("Email and password are required")),
    }
}

/// Keeps the tokens server-side so cookie-only clients stay signed in.
pub(crate) async fn remember(session: &Session, auth: &AuthSession) -> AppResult<()> {
    session.insert(ACCESS_TOKEN, &auth.access_token).await?;
    session.insert(REFRESH_TOKEN, &auth.refresh_token).await?;
    Ok(())
}
