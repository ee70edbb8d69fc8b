use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{appresult::Payload, session::Actor, AppResult, AppState};

use super::{lifecycle, review_gate, Review, SwapStore};

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewBody {
    rating: i64,
    comment: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ReviewCreated {
    message: &'static str,
    review: Review,
}

#[derive(Serialize)]
pub(crate) struct Eligibility {
    can_review: bool,
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_review(
    State(store): State<SwapStore>,
    actor: Actor,
    Path(id): Path<Uuid>,

    Payload(ReviewBody { rating, comment }): Payload<ReviewBody>,
) -> AppResult<(StatusCode, Json<ReviewCreated>)> {
    let review = review_gate::create_review(&store, id, actor.id(), rating, comment).await?;
    Ok((StatusCode::CREATED, Json(ReviewCreated { message: "Review submitted", review })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn eligibility(
    State(store): State<SwapStore>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Eligibility>> {
    let swap = lifecycle::get_for(&store, id, actor.id()).await?;
    let can_review = review_gate::can_review(&store, &swap, actor.id()).await?;
    Ok(Json(Eligibility { can_review }))
}
