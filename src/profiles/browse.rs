use std::sync::Arc;

use axum::{debug_handler, extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{
    session::Actor,
    swaps::SwapStore,
    users::{apply_ratings, IdentityGateway, User},
    AppResult, AppState,
};

/// Optional, case-insensitive substring filters. Blank values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseFilter {
    pub q: Option<String>,
    pub location: Option<String>,
    pub skill: Option<String>,
    pub availability: Option<String>,
}

fn needle(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl BrowseFilter {
    pub fn accepts(&self, user: &User) -> bool {
        let q = needle(&self.q).is_none_or(|q| {
            contains(&user.name, &q)
                || user.skills_offered.iter().any(|s| contains(s, &q))
                || user.skills_wanted.iter().any(|s| contains(s, &q))
        });
        let location = needle(&self.location)
            .is_none_or(|l| user.location.as_deref().is_some_and(|loc| contains(loc, &l)));
        let skill = needle(&self.skill).is_none_or(|s| user.skills_offered.iter().any(|o| contains(o, &s)));
        let availability = needle(&self.availability)
            .is_none_or(|a| user.availability.iter().any(|slot| contains(slot.label(), &a)));

        q && location && skill && availability
    }
}

/// Members `viewer_id` may browse that pass `filter`, ordered by name.
pub fn browse(users: Vec<User>, viewer_id: &str, filter: &BrowseFilter) -> Vec<User> {
    let mut found: Vec<User> = users
        .into_iter()
        .filter(|user| user.id != viewer_id && user.is_browseable() && filter.accepts(user))
        .collect();
    found.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    found
}

#[derive(Serialize)]
pub(crate) struct Directory {
    users: Vec<User>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn browse_users(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,
    Query(filter): Query<BrowseFilter>,
) -> AppResult<Json<Directory>> {
    let users = gateway.list_users().await?.iter().map(User::from_gateway).collect();
    let found = browse(users, actor.id(), &filter);
    let users = apply_ratings(found, &store.rating_totals().await?);
    Ok(Json(Directory { users }))
}
