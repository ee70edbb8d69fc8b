use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Serialize;

use crate::{
    session::Actor,
    swaps::{matches::{compute_matches, Matches}, Review, SwapStore},
    users::{IdentityGateway, RatingSummary, User},
    AppError, AppResult, AppState,
};

#[derive(Serialize)]
pub(crate) struct Profile {
    user: User,
}

#[derive(Serialize)]
pub(crate) struct ReviewsReceived {
    reviews: Vec<Review>,
    summary: Option<RatingSummary>,
}

/// A member the actor is allowed to look at: anyone browseable, or themselves.
async fn visible_user(gateway: &dyn IdentityGateway, actor: &Actor, user_id: &str) -> AppResult<User> {
    if user_id == actor.id() {
        return Ok(actor.user.clone());
    }

    let record = gateway.get_user(user_id).await?.ok_or(AppError::NotFound("user"))?;
    let user = User::from_gateway(&record);
    if !user.is_browseable() {
        return Err(AppError::ProfileNotBrowsable);
    }
    Ok(user)
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Profile>> {
    let user = visible_user(gateway.as_ref(), &actor, &id).await?;
    let rating = store.rating_for(&user.id).await?;
    Ok(Json(Profile { user: user.with_rating(rating) }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn matches(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Matches>> {
    let target = visible_user(gateway.as_ref(), &actor, &id).await?;
    Ok(Json(compute_matches(
        &actor.user.skills_offered,
        &actor.user.skills_wanted,
        &target.skills_offered,
        &target.skills_wanted,
    )))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reviews(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<ReviewsReceived>> {
    let user = visible_user(gateway.as_ref(), &actor, &id).await?;
    let reviews = store.reviews_for(&user.id).await?;
    let summary = RatingSummary::from_ratings(reviews.iter().map(|r| r.rating));
    Ok(Json(ReviewsReceived { reviews, summary }))
}
