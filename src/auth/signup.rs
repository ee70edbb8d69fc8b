use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tower_sessions::Session;

use crate::{
    appresult::Payload,
    users::{sanitize_metadata, AuthSession, IdentityGateway, User},
    AppResult, AppState,
};

use super::{credentials, remember};

#[derive(Deserialize)]
pub(crate) struct SignupBody {
    email: Option<String>,
    password: Option<String>,
    #[serde(default)]
    user_metadata: Map<String, Value>,
}

#[derive(Serialize)]
pub(crate) struct SignedUp {
    message: &'static str,
    user: User,
    session: Option<AuthSession>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn signup(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    session: Session,

    Payload(SignupBody { email, password, user_metadata }): Payload<SignupBody>,
) -> AppResult<(StatusCode, Json<SignedUp>)> {
    let (email, password) = credentials(email, password)?;

    let mut metadata = sanitize_metadata(user_metadata)?;
    metadata.entry("isPublic").or_insert(Value::Bool(true));
    metadata
        .entry("joinedAt")
        .or_insert_with(|| Value::String(OffsetDateTime::now_utc().date().to_string()));

    let outcome = gateway.sign_up(&email, &password, metadata).await?;
    if let Some(auth) = &outcome.session {
        remember(&session, auth).await?;
    }

    tracing::info!(user_id = %outcome.user.id, confirmed = outcome.session.is_some(), "account created");

    Ok((
        StatusCode::CREATED,
        Json(SignedUp {
            message: "User created successfully",
            user: User::from_gateway(&outcome.user),
            session: outcome.session,
        }),
    ))
}
