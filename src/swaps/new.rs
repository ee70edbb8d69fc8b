use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{appresult::Payload, session::Actor, users::IdentityGateway, AppResult, AppState};

use super::{lifecycle::{self, NewSwap}, Swap, SwapStore};

#[derive(Debug, Deserialize)]
pub(crate) struct NewSwapBody {
    #[serde(default)]
    requested_from_user_id: String,
    #[serde(default)]
    skill_offered: String,
    #[serde(default)]
    skill_requested: String,
    message: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SwapCreated {
    message: &'static str,
    swap: Swap,
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_swap(
    State(store): State<SwapStore>,
    State(gateway): State<Arc<dyn IdentityGateway>>,
    actor: Actor,

    Payload(body): Payload<NewSwapBody>,
) -> AppResult<(StatusCode, Json<SwapCreated>)> {
    let request = NewSwap {
        requested_from_user_id: body.requested_from_user_id,
        skill_offered: body.skill_offered,
        skill_requested: body.skill_requested,
        message: body.message,
    };
    let swap = lifecycle::create(&store, gateway.as_ref(), &actor.user, request).await?;

    Ok((StatusCode::CREATED, Json(SwapCreated { message: "Swap request created", swap })))
}
