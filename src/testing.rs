//! In-memory stand-ins for the identity provider, for tests.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use time::{macros::date, Date};
use uuid::Uuid;

use crate::{
    db,
    swaps::SwapStore,
    users::{AuthOutcome, AuthSession, Availability, GatewayUser, IdentityGateway, Role, User},
    AppError, AppResult, AppState, Config,
};

#[derive(Default)]
struct Directory {
    users: HashMap<String, GatewayUser>,
    passwords: HashMap<String, String>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    password_resets: Vec<String>,
}

impl Directory {
    fn issue_session(&mut self, user_id: &str) -> AuthSession {
        let session = AuthSession {
            access_token: format!("at-{}", Uuid::now_v7().simple()),
            refresh_token: format!("rt-{}", Uuid::now_v7().simple()),
            expires_in: Some(3600),
        };
        self.access_tokens.insert(session.access_token.clone(), user_id.to_owned());
        self.refresh_tokens.insert(session.refresh_token.clone(), user_id.to_owned());
        session
    }

    fn user_for_token(&self, access_token: &str) -> AppResult<&GatewayUser> {
        self.access_tokens
            .get(access_token)
            .and_then(|id| self.users.get(id))
            .ok_or_else(|| AppError::AuthenticationFailed("Invalid or expired token".to_owned()))
    }
}

/// An identity provider held in memory. Clones share the same directory.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    directory: Arc<Mutex<Directory>>,
}

impl MemoryGateway {
    fn directory(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `user` and makes `access_token` authenticate as them.
    pub fn add_user(&self, user: User, access_token: &str) {
        let record = gateway_record(&user);
        let mut directory = self.directory();
        directory.access_tokens.insert(access_token.to_owned(), record.id.clone());
        directory.users.insert(record.id.clone(), record);
    }

    pub fn record(&self, user_id: &str) -> Option<GatewayUser> {
        self.directory().users.get(user_id).cloned()
    }

    /// Addresses a password reset was requested for, oldest first.
    pub fn password_resets(&self) -> Vec<String> {
        self.directory().password_resets.clone()
    }
}

fn merge(target: &mut Value, partial: Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        fields.extend(partial);
    }
}

/// The identity record a provider would hold for `user`.
pub fn gateway_record(user: &User) -> GatewayUser {
    GatewayUser {
        id: user.id.clone(),
        email: user.email.clone(),
        user_metadata: json!({
            "name": user.name,
            "location": user.location,
            "profilePhoto": user.profile_photo,
            "skillsOffered": user.skills_offered,
            "skillsWanted": user.skills_wanted,
            "availability": user.availability.iter().map(Availability::label).collect::<Vec<_>>(),
            "isPublic": user.is_public,
            "joinedAt": user.joined_at.to_string(),
        }),
        app_metadata: json!({
            "role": user.role,
            "isActive": user.is_active,
        }),
        created_at: None,
    }
}

#[async_trait]
impl IdentityGateway for MemoryGateway {
    async fn sign_up(&self, email: &str, password: &str, metadata: Map<String, Value>) -> AppResult<AuthOutcome> {
        let mut directory = self.directory();
        if directory.users.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AppError::validation("User already registered"));
        }

        let user = GatewayUser {
            id: Uuid::now_v7().to_string(),
            email: email.to_owned(),
            user_metadata: Value::Object(metadata),
            app_metadata: json!({ "provider": "email" }),
            created_at: None,
        };
        directory.passwords.insert(user.id.clone(), password.to_owned());
        directory.users.insert(user.id.clone(), user.clone());
        let session = directory.issue_session(&user.id);

        Ok(AuthOutcome { user, session: Some(session) })
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthOutcome> {
        let mut directory = self.directory();
        let user = directory
            .users
            .values()
            .find(|u| {
                u.email.eq_ignore_ascii_case(email)
                    && directory.passwords.get(&u.id).is_some_and(|p| p == password)
            })
            .cloned()
            .ok_or_else(|| AppError::AuthenticationFailed("Invalid login credentials".to_owned()))?;
        let session = directory.issue_session(&user.id);

        Ok(AuthOutcome { user, session: Some(session) })
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        self.directory()
            .access_tokens
            .remove(access_token)
            .map(|_| ())
            .ok_or_else(|| AppError::AuthenticationFailed("Invalid or expired token".to_owned()))
    }

    async fn current_user(&self, access_token: &str) -> AppResult<GatewayUser> {
        self.directory().user_for_token(access_token).cloned()
    }

    async fn update_metadata(&self, access_token: &str, partial: Map<String, Value>) -> AppResult<GatewayUser> {
        let mut directory = self.directory();
        let id = directory.user_for_token(access_token)?.id.clone();
        let user = directory.users.get_mut(&id).ok_or(AppError::NotFound("user"))?;
        merge(&mut user.user_metadata, partial);
        Ok(user.clone())
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<AuthSession> {
        let mut directory = self.directory();
        let id = directory
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| AppError::AuthenticationFailed("Invalid Refresh Token".to_owned()))?;
        Ok(directory.issue_session(&id))
    }

    async fn reset_password(&self, email: &str) -> AppResult<()> {
        self.directory().password_resets.push(email.to_owned());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<GatewayUser>> {
        Ok(self.directory().users.get(user_id).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<GatewayUser>> {
        let mut users: Vec<_> = self.directory().users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn update_app_metadata(&self, user_id: &str, partial: Map<String, Value>) -> AppResult<GatewayUser> {
        let mut directory = self.directory();
        let user = directory.users.get_mut(user_id).ok_or(AppError::NotFound("user"))?;
        merge(&mut user.app_metadata, partial);
        Ok(user.clone())
    }
}

/// Builds [`User`]s with sensible defaults: public, active, no skills.
pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    pub fn new(id: &str) -> Self {
        let mut name = id.to_owned();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }

        Self {
            user: User {
                id: id.to_owned(),
                name,
                email: format!("{id}@example.com"),
                location: None,
                profile_photo: None,
                skills_offered: BTreeSet::new(),
                skills_wanted: BTreeSet::new(),
                availability: BTreeSet::new(),
                is_public: true,
                role: Role::User,
                rating: 0.0,
                review_count: 0,
                joined_at: date!(2024 - 01 - 01),
                is_active: true,
            },
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.user.name = name.to_owned();
        self
    }

    pub fn located(mut self, location: &str) -> Self {
        self.user.location = Some(location.to_owned());
        self
    }

    pub fn offers(mut self, skills: &[&str]) -> Self {
        self.user.skills_offered.extend(skills.iter().map(|s| s.to_string()));
        self
    }

    pub fn wants(mut self, skills: &[&str]) -> Self {
        self.user.skills_wanted.extend(skills.iter().map(|s| s.to_string()));
        self
    }

    pub fn available(mut self, slots: &[Availability]) -> Self {
        self.user.availability.extend(slots.iter().copied());
        self
    }

    pub fn joined(mut self, on: Date) -> Self {
        self.user.joined_at = on;
        self
    }

    pub fn private(mut self) -> Self {
        self.user.is_public = false;
        self
    }

    pub fn banned(mut self) -> Self {
        self.user.is_active = false;
        self
    }

    pub fn admin(mut self) -> Self {
        self.user.role = Role::Admin;
        self
    }

    pub fn build(self) -> User {
        self.user
    }
}

/// Application state over a fresh in-memory database and `gateway`.
pub async fn test_state(gateway: MemoryGateway) -> AppResult<AppState> {
    Ok(AppState {
        store: SwapStore::new(db::connect_in_memory().await?),
        gateway: Arc::new(gateway),
        config: Arc::new(Config::new("http://identity.test", "anon-key")),
    })
}
