use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::AppResult;

/// An account as the identity provider returns it. Profile attributes are
/// opaque JSON until mapped with [`super::User::from_gateway`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Result of signing up or in. Sign-up may return no session while the
/// email address awaits confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub user: GatewayUser,
    pub session: Option<AuthSession>,
}

/// The external identity provider. Credential failures come back as
/// `AppError::AuthenticationFailed`, never as a panic.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, metadata: Map<String, Value>) -> AppResult<AuthOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthOutcome>;

    async fn sign_out(&self, access_token: &str) -> AppResult<()>;

    async fn current_user(&self, access_token: &str) -> AppResult<GatewayUser>;

    async fn update_metadata(&self, access_token: &str, partial: Map<String, Value>) -> AppResult<GatewayUser>;

    async fn refresh(&self, refresh_token: &str) -> AppResult<AuthSession>;

    async fn reset_password(&self, email: &str) -> AppResult<()>;

    // Directory calls, made with administrative credentials.

    async fn get_user(&self, user_id: &str) -> AppResult<Option<GatewayUser>>;

    async fn list_users(&self) -> AppResult<Vec<GatewayUser>>;

    /// Merges `partial` into the account's administrative metadata.
    async fn update_app_metadata(&self, user_id: &str, partial: Map<String, Value>) -> AppResult<GatewayUser>;
}
