use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    appresult::Payload,
    swaps::SwapStore,
    users::{AuthSession, IdentityGateway, User},
    AppError, AppResult, AppState,
};

use super::{credentials, remember};

#[derive(Deserialize)]
pub(crate) struct SigninBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SignedIn {
    message: &'static str,
    user: User,
    session: AuthSession,
}

#[debug_handler(state = AppState)]
pub(crate) async fn signin(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    session: Session,

    Payload(SigninBody { email, password }): Payload<SigninBody>,
) -> AppResult<Json<SignedIn>> {
    let (email, password) = credentials(email, password)?;

    let outcome = gateway.sign_in(&email, &password).await?;
    let auth = outcome
        .session
        .ok_or_else(|| AppError::Gateway("sign-in returned no session".to_owned()))?;
    remember(&session, &auth).await?;

    let user = User::from_gateway(&outcome.user);
    let rating = store.rating_for(&user.id).await?;
    let user = user.with_rating(rating);
    tracing::info!(user_id = %user.id, "signed in");

    Ok(Json(SignedIn {
        message: "Signed in successfully",
        user,
        session: auth,
    }))
}
