//! Moderation and reporting. Every route requires an administrator.

mod members;
mod monitor;
mod stats;

pub mod reports;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};

use crate::{
    swaps::SwapStore,
    users::{apply_ratings, IdentityGateway, User},
    AppResult, AppState,
};

pub use members::{MemberFilter, MemberStatus};
pub use monitor::{MonitoredSwap, SwapFilter};
pub use stats::AdminStats;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats::stats))
        .route("/users", get(members::list_members))
        .route("/users/{id}/ban", post(members::ban))
        .route("/users/{id}/unban", post(members::unban))
        .route("/swaps", get(monitor::list_swaps))
        .route("/reports/{kind}", get(reports::report))
}

/// Every account in the directory, with review-derived ratings.
pub(crate) async fn all_members(gateway: &Arc<dyn IdentityGateway>, store: &SwapStore) -> AppResult<Vec<User>> {
    let users = gateway.list_users().await?.iter().map(User::from_gateway).collect();
    Ok(apply_ratings(users, &store.rating_totals().await?))
}
