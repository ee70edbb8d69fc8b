mod browse;
mod page;

use axum::{routing::get, Router};

use crate::AppState;

pub use browse::{browse, BrowseFilter};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(browse::browse_users))
        .route("/{id}", get(page::profile))
        .route("/{id}/matches", get(page::matches))
        .route("/{id}/reviews", get(page::reviews))
}
