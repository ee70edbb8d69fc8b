use std::{str::FromStr, sync::Arc};

use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    session::Actor,
    swaps::SwapStore,
    users::{IdentityGateway, User},
    AppError, AppResult, AppState,
};

use super::all_members;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemberStatus {
    #[default]
    All,
    Active,
    Banned,
}

impl FromStr for MemberStatus {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "banned" => Ok(Self::Banned),
            _ => Err(AppError::validation(format!("unknown member status {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub q: Option<String>,
    pub status: MemberStatus,
}

impl MemberFilter {
    /// Administrators never show up here.
    pub fn accepts(&self, user: &User) -> bool {
        let matches_search = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
            .is_none_or(|q| user.name.to_lowercase().contains(&q) || user.email.to_lowercase().contains(&q));
        let matches_status = match self.status {
            MemberStatus::All => true,
            MemberStatus::Active => user.is_active,
            MemberStatus::Banned => !user.is_active,
        };

        matches_search && matches_status && !user.is_admin()
    }
}

#[derive(Deserialize)]
pub(crate) struct MemberQuery {
    q: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct MemberList {
    users: Vec<User>,
}

#[derive(Serialize)]
pub(crate) struct Moderated {
    message: &'static str,
    user: User,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_members(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,
    Query(MemberQuery { q, status }): Query<MemberQuery>,
) -> AppResult<Json<MemberList>> {
    actor.require_admin()?;

    let filter = MemberFilter {
        q,
        status: status.as_deref().map(str::parse::<MemberStatus>).transpose()?.unwrap_or_default(),
    };
    let users = all_members(&gateway, &store)
        .await?
        .into_iter()
        .filter(|user| filter.accepts(user))
        .collect();
    Ok(Json(MemberList { users }))
}

async fn set_active(
    gateway: &dyn IdentityGateway,
    actor: &Actor,
    user_id: &str,
    active: bool,
) -> AppResult<User> {
    actor.require_admin()?;

    let record = gateway.get_user(user_id).await?.ok_or(AppError::NotFound("user"))?;
    if User::from_gateway(&record).is_admin() {
        return Err(AppError::Forbidden("administrators cannot be banned".to_owned()));
    }

    let mut partial = Map::new();
    partial.insert("isActive".to_owned(), Value::Bool(active));
    let record = gateway.update_app_metadata(user_id, partial).await?;

    tracing::info!(user_id, by = actor.id(), active, "account moderated");
    Ok(User::from_gateway(&record))
}

#[debug_handler(state = AppState)]
pub(crate) async fn ban(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Moderated>> {
    let user = set_active(gateway.as_ref(), &actor, &id, false).await?;
    Ok(Json(Moderated { message: "User banned", user }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unban(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    actor: Actor,
    Path(id): Path<String>,
) -> AppResult<Json<Moderated>> {
    let user = set_active(gateway.as_ref(), &actor, &id, true).await?;
    Ok(Json(Moderated { message: "User unbanned", user }))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::testing::{MemoryGateway, UserBuilder};

    fn members() -> Vec<User> {
        vec![
            UserBuilder::new("alice").named("Alice Smith").build(),
            UserBuilder::new("bob").banned().build(),
            UserBuilder::new("root").admin().build(),
        ]
    }

    #[rstest]
    #[case(None, MemberStatus::All, vec!["alice", "bob"])]
    #[case(None, MemberStatus::Active, vec!["alice"])]
    #[case(None, MemberStatus::Banned, vec!["bob"])]
    #[case(Some("SMITH"), MemberStatus::All, vec!["alice"])]
    #[case(Some("bob@example"), MemberStatus::All, vec!["bob"])]
    #[case(Some("root"), MemberStatus::All, vec![])]
    fn member_filter(#[case] q: Option<&str>, #[case] status: MemberStatus, #[case] expected: Vec<&str>) {
        let filter = MemberFilter { q: q.map(str::to_owned), status };
        let found: Vec<_> = members().into_iter().filter(|u| filter.accepts(u)).map(|u| u.id).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert!(matches!("suspended".parse::<MemberStatus>(), Err(AppError::Validation(_))));
    }

    fn admin_actor() -> Actor {
        Actor { user: UserBuilder::new("root").admin().build(), access_token: "root-token".to_owned() }
    }

    #[tokio::test]
    async fn ban_then_unban() {
        let gateway = MemoryGateway::default();
        gateway.add_user(UserBuilder::new("bob").build(), "bob-token");

        let banned = set_active(&gateway, &admin_actor(), "bob", false).await.unwrap();
        assert!(!banned.is_active);
        assert_eq!(gateway.record("bob").unwrap().app_metadata["isActive"], json!(false));

        let restored = set_active(&gateway, &admin_actor(), "bob", true).await.unwrap();
        assert!(restored.is_active);
    }

    #[tokio::test]
    async fn admins_cannot_be_banned() {
        let gateway = MemoryGateway::default();
        gateway.add_user(UserBuilder::new("ops").admin().build(), "ops-token");

        let err = set_active(&gateway, &admin_actor(), "ops", false).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn members_cannot_moderate() {
        let gateway = MemoryGateway::default();
        gateway.add_user(UserBuilder::new("bob").build(), "bob-token");
        let member = Actor { user: UserBuilder::new("alice").build(), access_token: "alice-token".to_owned() };

        let err = set_active(&gateway, &member, "bob", false).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(gateway.record("bob").unwrap().app_metadata["isActive"].as_bool().unwrap());
    }
}
