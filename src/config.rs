//! Service configuration, read from the environment (and `.env` when present).

use std::net::SocketAddr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the identity provider, e.g. `https://xyz.supabase.co`.
    /// Env: `SUPABASE_URL` (required)
    pub supabase_url: String,

    /// Public API key sent with every auth call.
    /// Env: `SUPABASE_ANON_KEY` (required)
    pub anon_key: String,

    /// Service-role key for directory and moderation calls.
    /// Env: `SUPABASE_SERVICE_ROLE_KEY`
    /// Without it browsing, counterparty lookups and admin routes fail.
    pub service_role_key: Option<String>,

    /// Env: `DATABASE_URL`
    /// Default: `sqlite://skillswap.db?mode=rwc`
    pub database_url: String,

    /// Env: `DB_MAX_CONNECTIONS`
    /// Default: `16`
    pub db_max_connections: u32,

    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3001`
    pub http_addr: SocketAddr,

    /// Browser origin allowed by CORS, also the target of password-reset links.
    /// Env: `FRONTEND_URL`
    /// Default: `http://localhost:5173`
    pub frontend_url: String,

    /// Env: `SESSION_IDLE_MINUTES`
    /// Default: `30`
    pub session_idle_minutes: i64,
}

impl Config {
    pub const DEFAULT_DATABASE_URL: &'static str = "sqlite://skillswap.db?mode=rwc";

    /// Configuration with every optional setting at its default.
    pub fn new(supabase_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into().trim_end_matches('/').to_owned(),
            anon_key: anon_key.into(),
            service_role_key: None,
            database_url: Self::DEFAULT_DATABASE_URL.to_owned(),
            db_max_connections: 16,
            http_addr: ([0, 0, 0, 0], 3001).into(),
            frontend_url: "http://localhost:5173".to_owned(),
            session_idle_minutes: 30,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        // a missing .env file is fine
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let supabase_url = var("SUPABASE_URL")
            .filter(|v| !v.is_empty())
            .context("SUPABASE_URL must be set")?;
        let anon_key = var("SUPABASE_ANON_KEY")
            .filter(|v| !v.is_empty())
            .context("SUPABASE_ANON_KEY must be set")?;

        let mut config = Self::new(supabase_url, anon_key);

        config.service_role_key = var("SUPABASE_SERVICE_ROLE_KEY").filter(|v| !v.is_empty());

        if let Some(url) = var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(addr) = var("HTTP_ADDR") {
            config.http_addr = addr
                .parse()
                .with_context(|| format!("invalid HTTP_ADDR {addr:?}"))?;
        }

        if let Some(url) = var("FRONTEND_URL") {
            config.frontend_url = url.trim_end_matches('/').to_owned();
        }

        if let Some(val) = var("SESSION_IDLE_MINUTES") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 => config.session_idle_minutes = n,
                _ => tracing::warn!(value = %val, "Invalid SESSION_IDLE_MINUTES, using default"),
            }
        }

        if let Some(val) = var("DB_MAX_CONNECTIONS") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.db_max_connections = n,
                _ => tracing::warn!(value = %val, "Invalid DB_MAX_CONNECTIONS, using default"),
            }
        }

        Ok(config)
    }
}
