//! Tool endpoint (hub)
//!
//! Exposes the finder as JSON-RPC 2.0 tools on `POST /mcp`, behind bearer
//! authentication. `/` and `/version` stay public.

mod auth;
mod common;
mod tools;

pub use auth::{auth_middleware, AccessGrant, AuthGate};
pub use common::{RpcError, RpcRequest, RpcResponse};
pub use tools::{FINDER_TOOL, VALIDATE_TOOL};

use crate::finder::Finder;
use crate::{Result, VERSION};

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Bearer secret check
    pub gate: Arc<AuthGate>,
    /// Probe + discovery orchestrator
    pub finder: Finder,
    /// Identifier returned by the `validate` tool
    pub validate_id: Arc<str>,
}

impl AppState {
    pub fn new(secret: &str, validate_id: &str, finder: Finder) -> Self {
        AppState {
            gate: Arc::new(AuthGate::new(secret)),
            finder,
            validate_id: Arc::from(validate_id),
        }
    }
}

/// Create the main router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(hello))
        .route("/version", get(version))
        .route("/mcp", post(tools::handle_rpc))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the tool endpoint
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let router = create_router(state);
    info!("Starting tool endpoint on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

async fn hello() -> Json<Value> {
    Json(json!({ "hello": "mc-server-finder" }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": format!("mc-server-finder {}", VERSION),
        "tools": [tools::VALIDATE_TOOL, tools::FINDER_TOOL]
    }))
}
