use axum::{debug_handler, extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{appresult::Payload, session::Actor, AppResult, AppState};

use super::{lifecycle, Swap, SwapStatus, SwapStore};

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    #[serde(default)]
    status: String,
}

#[derive(Serialize)]
pub(crate) struct SwapUpdated {
    message: String,
    swap: Swap,
}

#[derive(Serialize)]
pub(crate) struct SwapBody {
    swap: Swap,
}

#[debug_handler(state = AppState)]
pub(crate) async fn swap(
    State(store): State<SwapStore>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SwapBody>> {
    let swap = lifecycle::get_for(&store, id, actor.id()).await?;
    Ok(Json(SwapBody { swap }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_status(
    State(store): State<SwapStore>,
    actor: Actor,
    Path(id): Path<Uuid>,

    Payload(StatusBody { status }): Payload<StatusBody>,
) -> AppResult<Json<SwapUpdated>> {
    let status: SwapStatus = status.parse()?;
    let swap = lifecycle::transition(&store, id, actor.id(), status).await?;

    Ok(Json(SwapUpdated {
        message: format!("Swap {status}"),
        swap,
    }))
}
