use std::{future::IntoFuture, sync::Arc};

use skillswap::{app, db, swaps::SwapStore, users::GoTrueGateway, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,skillswap=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        identity = %config.supabase_url,
        database = %config.database_url,
        frontend = %config.frontend_url,
        directory_access = config.service_role_key.is_some(),
        "starting SkillSwap server"
    );
    if config.service_role_key.is_none() {
        tracing::warn!("SUPABASE_SERVICE_ROLE_KEY not set, browsing and moderation will fail");
    }

    let db_pool = db::connect(&config.database_url, config.db_max_connections).await?;
    let gateway = GoTrueGateway::from_config(&config)?;

    let addr = config.http_addr;
    let app_state = AppState {
        store: SwapStore::new(db_pool),
        gateway: Arc::new(gateway),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    tokio::select! {
        result = axum::serve(listener, app(app_state)).into_future() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}
