use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::Serialize;

use crate::{
    session::Actor,
    swaps::{Review, Swap, SwapStatus, SwapStore},
    users::{IdentityGateway, RatingSummary, User},
    AppResult, AppState,
};

use super::all_members;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: usize,
    pub active_users: usize,
    pub total_swaps: usize,
    pub pending_swaps: usize,
    pub completed_swaps: usize,
    pub average_rating: f64,
}

impl AdminStats {
    pub fn compute(users: &[User], swaps: &[Swap], reviews: &[Review]) -> AdminStats {
        let with_status = |status: SwapStatus| swaps.iter().filter(|s| s.status == status).count();
        AdminStats {
            total_users: users.len(),
            active_users: users.iter().filter(|u| u.is_active).count(),
            total_swaps: swaps.len(),
            pending_swaps: with_status(SwapStatus::Pending),
            completed_swaps: with_status(SwapStatus::Completed),
            average_rating: RatingSummary::from_ratings(reviews.iter().map(|r| r.rating))
                .map_or(0.0, |summary| summary.average),
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn stats(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,
) -> AppResult<Json<AdminStats>> {
    actor.require_admin()?;

    let users = all_members(&gateway, &store).await?;
    let swaps = store.all_swaps().await?;
    let reviews = store.all_reviews().await?;
    Ok(Json(AdminStats::compute(&users, &swaps, &reviews)))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::testing::UserBuilder;

    fn swap(status: SwapStatus) -> Swap {
        let at = datetime!(2025-03-01 12:00 UTC);
        Swap {
            id: Uuid::now_v7(),
            offered_by_user_id: "alice".to_owned(),
            requested_from_user_id: "bob".to_owned(),
            skill_offered: "React".to_owned(),
            skill_requested: "Photography".to_owned(),
            message: None,
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn review(rating: u8) -> Review {
        Review {
            id: Uuid::now_v7(),
            swap_id: Uuid::now_v7(),
            reviewer_id: "alice".to_owned(),
            reviewee_id: "bob".to_owned(),
            rating,
            comment: String::new(),
            created_at: datetime!(2025-03-02 12:00 UTC),
        }
    }

    #[test]
    fn counts_and_average() {
        let users = vec![
            UserBuilder::new("alice").build(),
            UserBuilder::new("bob").banned().build(),
            UserBuilder::new("root").admin().build(),
        ];
        let swaps = vec![
            swap(SwapStatus::Pending),
            swap(SwapStatus::Pending),
            swap(SwapStatus::Completed),
            swap(SwapStatus::Cancelled),
        ];

        let stats = AdminStats::compute(&users, &swaps, &[review(5), review(4), review(4)]);

        assert_eq!(
            stats,
            AdminStats {
                total_users: 3,
                active_users: 2,
                total_swaps: 4,
                pending_swaps: 2,
                completed_swaps: 1,
                average_rating: 4.33,
            }
        );
    }

    #[test]
    fn no_reviews_averages_zero() {
        assert_eq!(AdminStats::compute(&[], &[], &[]).average_rating, 0.0);
    }
}
