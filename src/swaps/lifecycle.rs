//! Swap creation, status transitions and per-viewer listings.
//!
//! The checks here are pure functions over already-fetched records; the async
//! wrappers fetch, check, then issue exactly one write.

use std::cmp::Reverse;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    users::{IdentityGateway, User},
    AppError, AppResult,
};

use super::{Swap, SwapRole, SwapStatus, SwapStore};

/// Input for a new swap request, as sent by the offering party.
#[derive(Debug, Clone)]
pub struct NewSwap {
    pub requested_from_user_id: String,
    pub skill_offered: String,
    pub skill_requested: String,
    pub message: Option<String>,
}

impl NewSwap {
    fn normalized(self) -> AppResult<NewSwap> {
        let requested_from_user_id = self.requested_from_user_id.trim().to_owned();
        if requested_from_user_id.is_empty()
            || self.skill_offered.trim().is_empty()
            || self.skill_requested.trim().is_empty()
        {
            return Err(AppError::validation("Missing required fields"));
        }

        Ok(NewSwap {
            requested_from_user_id,
            message: self
                .message
                .map(|m| m.trim().to_owned())
                .filter(|m| !m.is_empty()),
            ..self
        })
    }
}

/// Checks a swap request against both parties' current profiles.
pub fn check_new_swap(offering: &User, counterparty: &User, request: &NewSwap) -> AppResult<()> {
    if offering.id == counterparty.id {
        return Err(AppError::SelfSwapNotAllowed);
    }
    if !counterparty.is_browseable() {
        return Err(AppError::ProfileNotBrowsable);
    }
    if !offering.skills_offered.contains(&request.skill_offered) {
        return Err(AppError::SkillNotOffered(request.skill_offered.clone()));
    }
    if !counterparty.skills_offered.contains(&request.skill_requested) {
        return Err(AppError::SkillNotAvailable(request.skill_requested.clone()));
    }
    Ok(())
}

/// Decides whether `actor_id` may move `swap` to `target`.
pub fn check_transition(swap: &Swap, actor_id: &str, target: SwapStatus) -> AppResult<()> {
    use SwapStatus::*;

    let is_offering = swap.offered_by_user_id == actor_id;
    let is_requested = swap.requested_from_user_id == actor_id;

    let allowed = match (swap.status, target) {
        (Pending, Accepted) | (Pending, Rejected) => is_requested,
        (Pending, Cancelled) => is_offering,
        (Accepted, Completed) => is_offering || is_requested,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: swap.status,
            to: target,
        })
    }
}

/// Most recent first, ties broken by id, both descending.
pub fn sort_newest_first(swaps: &mut [Swap]) {
    swaps.sort_by_key(|swap| Reverse((swap.created_at, swap.id)));
}

pub async fn create(
    store: &SwapStore,
    gateway: &dyn IdentityGateway,
    offering: &User,
    request: NewSwap,
) -> AppResult<Swap> {
    if offering.id == request.requested_from_user_id.trim() {
        return Err(AppError::SelfSwapNotAllowed);
    }
    let request = request.normalized()?;

    let counterparty = gateway
        .get_user(&request.requested_from_user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let counterparty = User::from_gateway(&counterparty);

    check_new_swap(offering, &counterparty, &request)?;

    let now = OffsetDateTime::now_utc();
    let swap = Swap {
        id: Uuid::now_v7(),
        offered_by_user_id: offering.id.clone(),
        requested_from_user_id: counterparty.id,
        skill_offered: request.skill_offered,
        skill_requested: request.skill_requested,
        message: request.message,
        status: SwapStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    store.insert_swap(&swap).await?;

    tracing::info!(
        swap_id = %swap.id,
        offered_by = %swap.offered_by_user_id,
        requested_from = %swap.requested_from_user_id,
        "swap requested"
    );
    Ok(swap)
}

pub async fn list_for(
    store: &SwapStore,
    user_id: &str,
    role: SwapRole,
    status: Option<SwapStatus>,
) -> AppResult<Vec<Swap>> {
    let mut swaps = store.swaps_for_user(user_id, role).await?;
    if let Some(status) = status {
        swaps.retain(|swap| swap.status == status);
    }
    sort_newest_first(&mut swaps);
    Ok(swaps)
}

/// A swap the actor is a party to. Other people's swaps read as missing.
pub async fn get_for(store: &SwapStore, swap_id: Uuid, actor_id: &str) -> AppResult<Swap> {
    store
        .find_swap(swap_id)
        .await?
        .filter(|swap| swap.involves(actor_id))
        .ok_or(AppError::NotFound("swap"))
}

pub async fn transition(
    store: &SwapStore,
    swap_id: Uuid,
    actor_id: &str,
    target: SwapStatus,
) -> AppResult<Swap> {
    let swap = store
        .find_swap(swap_id)
        .await?
        .ok_or(AppError::NotFound("swap"))?;
    apply_transition(store, swap, actor_id, target).await
}

/// Moves `swap` as it was read to `target`. Fails with `Conflict` when the
/// stored status no longer matches what was read.
pub async fn apply_transition(
    store: &SwapStore,
    swap: Swap,
    actor_id: &str,
    target: SwapStatus,
) -> AppResult<Swap> {
    check_transition(&swap, actor_id, target)?;

    let now = OffsetDateTime::now_utc();
    if !store.update_status(swap.id, swap.status, target, now).await? {
        tracing::warn!(swap_id = %swap.id, expected = %swap.status, to = %target, "lost a status race");
        return Err(AppError::Conflict);
    }

    tracing::info!(swap_id = %swap.id, from = %swap.status, to = %target, actor = actor_id, "swap status changed");
    Ok(Swap {
        status: target,
        updated_at: now,
        ..swap
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use time::macros::datetime;

    use super::*;
    use crate::{db, testing::{MemoryGateway, UserBuilder}};

    fn alice() -> User {
        UserBuilder::new("alice").offers(&["React"]).wants(&["Photography"]).build()
    }

    fn bob() -> User {
        UserBuilder::new("bob").offers(&["Photography"]).wants(&["React"]).build()
    }

    fn request(to: &str, offered: &str, requested: &str) -> NewSwap {
        NewSwap {
            requested_from_user_id: to.to_owned(),
            skill_offered: offered.to_owned(),
            skill_requested: requested.to_owned(),
            message: None,
        }
    }

    fn swap_in(status: SwapStatus) -> Swap {
        let at = datetime!(2024-12-01 10:00 UTC);
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

    async fn fixture() -> (SwapStore, MemoryGateway) {
        let store = SwapStore::new(db::connect_in_memory().await.unwrap());
        let gateway = MemoryGateway::default();
        gateway.add_user(alice(), "alice-token");
        gateway.add_user(bob(), "bob-token");
        (store, gateway)
    }

    #[rstest]
    #[case(SwapStatus::Pending, "bob", SwapStatus::Accepted, true)]
    #[case(SwapStatus::Pending, "bob", SwapStatus::Rejected, true)]
    #[case(SwapStatus::Pending, "alice", SwapStatus::Cancelled, true)]
    #[case(SwapStatus::Accepted, "alice", SwapStatus::Completed, true)]
    #[case(SwapStatus::Accepted, "bob", SwapStatus::Completed, true)]
    #[case(SwapStatus::Pending, "alice", SwapStatus::Accepted, false)]
    #[case(SwapStatus::Pending, "alice", SwapStatus::Rejected, false)]
    #[case(SwapStatus::Pending, "bob", SwapStatus::Cancelled, false)]
    #[case(SwapStatus::Pending, "bob", SwapStatus::Completed, false)]
    #[case(SwapStatus::Pending, "bob", SwapStatus::Pending, false)]
    #[case(SwapStatus::Accepted, "carol", SwapStatus::Completed, false)]
    #[case(SwapStatus::Accepted, "alice", SwapStatus::Cancelled, false)]
    #[case(SwapStatus::Accepted, "bob", SwapStatus::Rejected, false)]
    fn transition_table(
        #[case] from: SwapStatus,
        #[case] actor: &str,
        #[case] to: SwapStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(check_transition(&swap_in(from), actor, to).is_ok(), allowed);
    }

    #[rstest]
    fn terminal_states_accept_nothing(
        #[values(SwapStatus::Rejected, SwapStatus::Completed, SwapStatus::Cancelled)] from: SwapStatus,
        #[values("alice", "bob")] actor: &str,
        #[values(
            SwapStatus::Pending,
            SwapStatus::Accepted,
            SwapStatus::Rejected,
            SwapStatus::Completed,
            SwapStatus::Cancelled
        )]
        to: SwapStatus,
    ) {
        let err = check_transition(&swap_in(from), actor, to).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[rstest]
    #[case("React", "Photography")]
    #[case("Cooking", "Chess")]
    #[case("", "")]
    fn self_swap_is_refused_whatever_the_skills(#[case] offered: &str, #[case] requested: &str) {
        let err = check_new_swap(&alice(), &alice(), &request("alice", offered, requested)).unwrap_err();
        assert!(matches!(err, AppError::SelfSwapNotAllowed));
    }

    #[test]
    fn skill_membership_is_checked_on_both_sides() {
        let err = check_new_swap(&alice(), &bob(), &request("bob", "Guitar", "Photography")).unwrap_err();
        assert!(matches!(err, AppError::SkillNotOffered(s) if s == "Guitar"));

        let err = check_new_swap(&alice(), &bob(), &request("bob", "React", "Cooking")).unwrap_err();
        assert!(matches!(err, AppError::SkillNotAvailable(s) if s == "Cooking"));

        // exact, case-sensitive match
        let err = check_new_swap(&alice(), &bob(), &request("bob", "react", "Photography")).unwrap_err();
        assert!(matches!(err, AppError::SkillNotOffered(_)));
    }

    #[rstest]
    #[case(UserBuilder::new("bob").offers(&["Photography"]).private().build())]
    #[case(UserBuilder::new("bob").offers(&["Photography"]).banned().build())]
    #[case(UserBuilder::new("bob").offers(&["Photography"]).admin().build())]
    fn hidden_counterparties_are_not_browsable(#[case] counterparty: User) {
        let err = check_new_swap(&alice(), &counterparty, &request("bob", "React", "Photography")).unwrap_err();
        assert!(matches!(err, AppError::ProfileNotBrowsable));
    }

    #[tokio::test]
    async fn create_stores_a_pending_swap() {
        let (store, gateway) = fixture().await;
        let mut req = request("bob", "React", "Photography");
        req.message = Some("  weekends work for me  ".to_owned());

        let swap = create(&store, &gateway, &alice(), req).await.unwrap();

        assert_eq!(swap.status, SwapStatus::Pending);
        assert_eq!(swap.created_at, swap.updated_at);
        assert_eq!(swap.offered_by_user_id, "alice");
        assert_eq!(swap.requested_from_user_id, "bob");
        assert_eq!(swap.message.as_deref(), Some("weekends work for me"));
        assert_eq!(store.find_swap(swap.id).await.unwrap(), Some(swap));
    }

    #[tokio::test]
    async fn create_rejects_before_writing() {
        let (store, gateway) = fixture().await;

        let err = create(&store, &gateway, &alice(), request("alice", "React", "React")).await.unwrap_err();
        assert!(matches!(err, AppError::SelfSwapNotAllowed));

        let err = create(&store, &gateway, &alice(), request("nobody", "React", "Photography")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));

        let err = create(&store, &gateway, &alice(), request(" ", "React", "Photography")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(store.all_swaps().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accept_then_complete() {
        let (store, gateway) = fixture().await;
        let swap = create(&store, &gateway, &alice(), request("bob", "React", "Photography")).await.unwrap();

        let accepted = transition(&store, swap.id, "bob", SwapStatus::Accepted).await.unwrap();
        assert_eq!(accepted.status, SwapStatus::Accepted);
        assert_eq!(accepted.created_at, swap.created_at);
        assert!(accepted.updated_at >= swap.updated_at);

        let completed = transition(&store, swap.id, "alice", SwapStatus::Completed).await.unwrap();
        assert_eq!(completed.status, SwapStatus::Completed);
        assert_eq!(store.find_swap(swap.id).await.unwrap(), Some(completed));
    }

    #[tokio::test]
    async fn rejected_swap_cannot_be_accepted() {
        let (store, gateway) = fixture().await;
        let swap = create(&store, &gateway, &alice(), request("bob", "React", "Photography")).await.unwrap();

        let rejected = transition(&store, swap.id, "bob", SwapStatus::Rejected).await.unwrap();
        let err = transition(&store, swap.id, "bob", SwapStatus::Accepted).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::InvalidTransition { from: SwapStatus::Rejected, to: SwapStatus::Accepted }
        ));
        assert_eq!(store.find_swap(swap.id).await.unwrap(), Some(rejected));
    }

    #[tokio::test]
    async fn unknown_swap_is_not_found() {
        let (store, _) = fixture().await;
        let err = transition(&store, Uuid::now_v7(), "bob", SwapStatus::Accepted).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("swap")));
    }

    #[tokio::test]
    async fn stale_prior_status_is_a_conflict() {
        let (store, gateway) = fixture().await;
        let swap = create(&store, &gateway, &alice(), request("bob", "React", "Photography")).await.unwrap();

        // alice withdraws between bob's read and bob's write
        assert!(store
            .update_status(swap.id, SwapStatus::Pending, SwapStatus::Cancelled, OffsetDateTime::now_utc())
            .await
            .unwrap());
        let changed = store
            .update_status(swap.id, SwapStatus::Pending, SwapStatus::Accepted, OffsetDateTime::now_utc())
            .await
            .unwrap();

        assert!(!changed);
        assert_eq!(store.find_swap(swap.id).await.unwrap().unwrap().status, SwapStatus::Cancelled);
    }

    #[tokio::test]
    async fn losing_a_race_is_a_conflict() {
        let (store, gateway) = fixture().await;
        let swap = create(&store, &gateway, &alice(), request("bob", "React", "Photography")).await.unwrap();

        let seen_by_bob = store.find_swap(swap.id).await.unwrap().unwrap();
        transition(&store, swap.id, "alice", SwapStatus::Cancelled).await.unwrap();

        let err = apply_transition(&store, seen_by_bob, "bob", SwapStatus::Accepted).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));
        assert_eq!(store.find_swap(swap.id).await.unwrap().unwrap().status, SwapStatus::Cancelled);
    }

    #[tokio::test]
    async fn listing_by_side() {
        let (store, gateway) = fixture().await;
        let carol = UserBuilder::new("carol").offers(&["Chess"]).build();
        gateway.add_user(carol.clone(), "carol-token");

        let sent = create(&store, &gateway, &alice(), request("bob", "React", "Photography")).await.unwrap();
        let received = create(&store, &gateway, &carol, request("alice", "Chess", "React")).await.unwrap();
        let unrelated = create(&store, &gateway, &carol, request("bob", "Chess", "Photography")).await.unwrap();

        let offered = list_for(&store, "alice", SwapRole::Offered, None).await.unwrap();
        let incoming = list_for(&store, "alice", SwapRole::Received, None).await.unwrap();
        let all = list_for(&store, "alice", SwapRole::All, None).await.unwrap();

        assert_eq!(offered, vec![sent.clone()]);
        assert_eq!(incoming, vec![received.clone()]);
        assert_eq!(all, vec![received.clone(), sent.clone()]);
        assert!(!all.contains(&unrelated));

        transition(&store, received.id, "alice", SwapStatus::Rejected).await.unwrap();
        let pending = list_for(&store, "alice", SwapRole::All, Some(SwapStatus::Pending)).await.unwrap();
        assert_eq!(pending, vec![sent]);
    }

    #[test]
    fn ties_on_created_at_fall_back_to_id() {
        let first = swap_in(SwapStatus::Pending);
        let second = swap_in(SwapStatus::Pending);
        let mut older = swap_in(SwapStatus::Pending);
        older.created_at -= time::Duration::days(1);

        let mut swaps = vec![older.clone(), first.clone(), second.clone()];
        sort_newest_first(&mut swaps);

        assert_eq!(swaps, vec![second, first, older]);
    }

    #[tokio::test]
    async fn only_parties_can_read_a_swap() {
        let (store, gateway) = fixture().await;
        let swap = create(&store, &gateway, &alice(), request("bob", "React", "Photography")).await.unwrap();

        assert_eq!(get_for(&store, swap.id, "bob").await.unwrap(), swap);
        assert!(matches!(get_for(&store, swap.id, "carol").await, Err(AppError::NotFound("swap"))));
    }
}
