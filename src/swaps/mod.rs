mod list;
mod model;
mod new;
mod reviews;
mod status;
mod store;

pub mod lifecycle;
pub mod matches;
pub mod review_gate;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use model::{Review, Swap, SwapRole, SwapStatus};
pub use store::SwapStore;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_swaps).post(new::new_swap))
        .route("/{id}", get(status::swap).patch(status::update_status))
        .route("/{id}/reviews", post(reviews::new_review))
        .route("/{id}/reviews/eligibility", get(reviews::eligibility))
}
