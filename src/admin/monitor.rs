use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{debug_handler, extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{
    session::Actor,
    swaps::{lifecycle::sort_newest_first, Swap, SwapStatus, SwapStore},
    users::IdentityGateway,
    AppResult, AppState,
};

use super::all_members;

/// A swap with both parties' display names attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredSwap {
    #[serde(flatten)]
    pub swap: Swap,
    pub offered_by_name: String,
    pub requested_from_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SwapFilter {
    pub q: Option<String>,
    pub status: Option<SwapStatus>,
}

impl SwapFilter {
    pub fn accepts(&self, swap: &MonitoredSwap) -> bool {
        let matches_status = self.status.is_none_or(|status| swap.swap.status == status);
        let matches_search = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
            .is_none_or(|q| {
                [
                    &swap.offered_by_name,
                    &swap.requested_from_name,
                    &swap.swap.skill_offered,
                    &swap.swap.skill_requested,
                ]
                .into_iter()
                .any(|field| field.to_lowercase().contains(&q))
            });

        matches_status && matches_search
    }
}

/// Attaches party names; ids with no directory entry keep the id as name.
pub fn monitor(mut swaps: Vec<Swap>, names: &HashMap<String, String>, filter: &SwapFilter) -> Vec<MonitoredSwap> {
    sort_newest_first(&mut swaps);
    let name_of = |id: &str| names.get(id).cloned().unwrap_or_else(|| id.to_owned());

    swaps
        .into_iter()
        .map(|swap| MonitoredSwap {
            offered_by_name: name_of(&swap.offered_by_user_id),
            requested_from_name: name_of(&swap.requested_from_user_id),
            swap,
        })
        .filter(|swap| filter.accepts(swap))
        .collect()
}

/// Number of swaps in each status, every status present.
pub fn status_counts(swaps: &[Swap]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = SwapStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for swap in swaps {
        *counts.entry(swap.status.as_str()).or_default() += 1;
    }
    counts
}

#[derive(Deserialize)]
pub(crate) struct MonitorQuery {
    q: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct Monitoring {
    swaps: Vec<MonitoredSwap>,
    counts: BTreeMap<&'static str, usize>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_swaps(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,
    Query(MonitorQuery { q, status }): Query<MonitorQuery>,
) -> AppResult<Json<Monitoring>> {
    actor.require_admin()?;

    let filter = SwapFilter {
        q,
        status: status.as_deref().map(str::parse::<SwapStatus>).transpose()?,
    };
    let names: HashMap<String, String> = all_members(&gateway, &store)
        .await?
        .into_iter()
        .map(|user| (user.id, user.name))
        .collect();

    let swaps = store.all_swaps().await?;
    let counts = status_counts(&swaps);
    Ok(Json(Monitoring {
        swaps: monitor(swaps, &names, &filter),
        counts,
    }))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;

    fn swap(from: &str, to: &str, offered: &str, requested: &str, status: SwapStatus) -> Swap {
        let at = datetime!(2025-04-01 08:00 UTC);
        Swap {
            id: Uuid::now_v7(),
            offered_by_user_id: from.to_owned(),
            requested_from_user_id: to.to_owned(),
            skill_offered: offered.to_owned(),
            skill_requested: requested.to_owned(),
            message: None,
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn names() -> HashMap<String, String> {
        HashMap::from([
            ("alice".to_owned(), "Alice Smith".to_owned()),
            ("bob".to_owned(), "Bob Jones".to_owned()),
        ])
    }

    #[test]
    fn search_covers_names_and_skills() {
        let swaps = vec![
            swap("alice", "bob", "React", "Photography", SwapStatus::Pending),
            swap("bob", "carol", "Photography", "Excel", SwapStatus::Completed),
        ];

        let by_name = monitor(swaps.clone(), &names(), &SwapFilter { q: Some("smith".into()), status: None });
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].requested_from_name, "Bob Jones");

        let by_skill = monitor(swaps.clone(), &names(), &SwapFilter { q: Some("EXCEL".into()), status: None });
        assert_eq!(by_skill.len(), 1);
        // unknown parties fall back to their id
        assert_eq!(by_skill[0].requested_from_name, "carol");

        let by_status = monitor(swaps, &names(), &SwapFilter { q: None, status: Some(SwapStatus::Pending) });
        assert_eq!(by_status.len(), 1);
        assert_eq!(by_status[0].swap.skill_offered, "React");
    }

    #[test]
    fn counts_include_empty_statuses() {
        let swaps = vec![
            swap("alice", "bob", "React", "Photography", SwapStatus::Pending),
            swap("alice", "bob", "React", "Photography", SwapStatus::Pending),
        ];
        let counts = status_counts(&swaps);

        assert_eq!(counts["pending"], 2);
        assert_eq!(counts["cancelled"], 0);
        assert_eq!(counts.len(), 5);
    }
}
