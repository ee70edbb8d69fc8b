use axum::{debug_handler, extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{session::Actor, AppResult, AppState};

use super::{lifecycle, Swap, SwapRole, SwapStatus, SwapStore};

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    role: SwapRole,
    status: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SwapList {
    swaps: Vec<Swap>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_swaps(
    State(store): State<SwapStore>,
    actor: Actor,
    Query(ListQuery { role, status }): Query<ListQuery>,
) -> AppResult<Json<SwapList>> {
    let status = status.as_deref().map(str::parse::<SwapStatus>).transpose()?;
    let swaps = lifecycle::list_for(&store, actor.id(), role, status).await?;
    Ok(Json(SwapList { swaps }))
}
