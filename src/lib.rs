pub mod admin;
pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod health;
pub mod profiles;
pub mod session;
pub mod swaps;
pub mod users;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use serde_json::Value;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};
pub use config::Config;

use swaps::SwapStore;
use users::IdentityGateway;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: SwapStore,
    pub gateway: Arc<dyn IdentityGateway>,
    pub config: Arc<Config>,
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
    /// String entries of an array field; anything else reads as empty.
    fn get_str_list(&self, field: &str) -> Vec<String>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or_else(|| AppError::Gateway(format!("expected {field} in response")))?
            .as_str()
            .ok_or_else(|| AppError::Gateway(format!("expected {field} in response to be string")))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
        .filter(|v| v.is_object())
        .ok_or_else(|| AppError::Gateway(format!("expected object {field} in response")))
    }

    fn get_str_list(&self, field: &str) -> Vec<String> {
        self.get(field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

/// The full HTTP application: routes, sessions, CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(state.config.session_idle_minutes)));

    let allow_origin = match state.config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(frontend_url = %state.config.frontend_url, "FRONTEND_URL is not a valid origin, CORS disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/auth", auth::router())
        .nest("/api/users", profiles::router())
        .nest("/api/swaps", swaps::router())
        .nest("/api/admin", admin::router())
        .fallback(health::not_found)
        .with_state(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
