use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arena_server::{create_router, AppState, ArenaLauncher, ServerConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_args(std::env::args().skip(1))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let listen = config.listen;
    let idle = Duration::from_secs(config.session.idle_timeout_secs);
    let gc_every = Duration::from_secs(config.session.gc_interval_secs);
    let engines: Vec<&str> = config.engines.iter().map(|e| e.name.as_str()).collect();
    tracing::info!(?engines, "engines configured");

    let state = AppState::new(config.clone(), Arc::new(ArenaLauncher::new()));
    state.registry.spawn_reaper(idle, gc_every);
    let registry = state.registry.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;
    tracing::info!(%listen, "arena server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("server error")?;

    registry.shutdown_all().await;
    Ok(())
}
