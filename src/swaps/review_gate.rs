use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::{Review, Swap, SwapStatus, SwapStore};

/// Whether `reviewer_id` may review `swap`, given the review they already
/// left on it, if any.
pub fn review_gate(swap: &Swap, reviewer_id: &str, prior: Option<&Review>) -> bool {
    swap.status == SwapStatus::Completed && swap.involves(reviewer_id) && prior.is_none()
}

pub async fn can_review(store: &SwapStore, swap: &Swap, reviewer_id: &str) -> AppResult<bool> {
    if !swap.involves(reviewer_id) {
        return Ok(false);
    }
    let prior = store.find_review(swap.id, reviewer_id).await?;
    Ok(review_gate(swap, reviewer_id, prior.as_ref()))
}

pub async fn create_review(
    store: &SwapStore,
    swap_id: Uuid,
    reviewer_id: &str,
    rating: i64,
    comment: Option<String>,
) -> AppResult<Review> {
    let rating = u8::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::validation("Rating must be between 1 and 5"))?;

    let swap = store
        .find_swap(swap_id)
        .await?
        .filter(|swap| swap.involves(reviewer_id))
        .ok_or(AppError::NotFound("swap"))?;

    if !can_review(store, &swap, reviewer_id).await? {
        return Err(AppError::ReviewNotAllowed);
    }
    let Some(reviewee_id) = swap.counterpart_of(reviewer_id) else {
        return Err(AppError::ReviewNotAllowed);
    };

    let review = Review {
        id: Uuid::now_v7(),
        swap_id: swap.id,
        reviewer_id: reviewer_id.to_owned(),
        reviewee_id: reviewee_id.to_owned(),
        rating,
        comment: comment.map(|c| c.trim().to_owned()).unwrap_or_default(),
        created_at: OffsetDateTime::now_utc(),
    };

    // the unique key still decides when two submissions race
    if !store.insert_review(&review).await? {
        return Err(AppError::ReviewNotAllowed);
    }

    tracing::info!(swap_id = %swap.id, reviewer = reviewer_id, rating, "review left");
    Ok(review)
}
