//! HTTP routes and shared state.

use std::sync::Arc;

use arena_runner::Launcher;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::registry::{Registry, SessionListing};
use crate::session::SessionContext;
use crate::ws;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<Registry>,
    pub launcher: Arc<dyn Launcher>,
}

impl AppState {
    pub fn new(config: ServerConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(Registry::new()),
            launcher,
        }
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            config: self.config.clone(),
            launcher: self.launcher.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub engines: Vec<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", get(sessions))
        .route("/ws", get(ws::ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.registry.len(),
        engines: state.config.engines.iter().map(|e| e.name.clone()).collect(),
    })
}

async fn sessions(State(state): State<AppState>) -> Json<Vec<SessionListing>> {
    Json(state.registry.list())
}
