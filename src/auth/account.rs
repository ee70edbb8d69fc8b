use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    appresult::Payload,
    session::Actor,
    swaps::SwapStore,
    users::{sanitize_metadata, IdentityGateway, User},
    AppError, AppResult, AppState,
};

#[derive(Serialize)]
pub(crate) struct Me {
    user: User,
}

#[derive(Deserialize)]
pub(crate) struct ProfileBody {
    user_metadata: Option<Map<String, Value>>,
}

#[derive(Serialize)]
pub(crate) struct ProfileUpdated {
    message: &'static str,
    user: User,
}

#[debug_handler(state = AppState)]
pub(crate) async fn me(State(store): State<SwapStore>, actor: Actor) -> AppResult<Json<Me>> {
    let rating = store.rating_for(actor.id()).await?;
    Ok(Json(Me { user: actor.user.with_rating(rating) }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_profile(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,

    Payload(ProfileBody { user_metadata }): Payload<ProfileBody>,
) -> AppResult<Json<ProfileUpdated>> {
    let partial = user_metadata.ok_or_else(|| AppError::validation("user_metadata is required"))?;
    let partial = sanitize_metadata(partial)?;

    let record = gateway.update_metadata(&actor.access_token, partial).await?;
    let user = User::from_gateway(&record);
    let rating = store.rating_for(&user.id).await?;
    tracing::info!(user_id = %user.id, "profile updated");

    Ok(Json(ProfileUpdated {
        message: "Profile updated successfully",
        user: user.with_rating(rating),
    }))
}
