/// HTTP surface: the chat page and the chat endpoint.
///
/// Provides `AppState` (shared state) and `ChatServer` (startup logic).
pub mod error;
pub mod handlers;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chain::RagChain;

/// Page served at `/` unless a template directory overrides it.
pub const DEFAULT_CHAT_PAGE: &str = include_str!("../../templates/chat.html");

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<RagChain>,
    pub chat_page: Arc<str>,
}

impl AppState {
    pub fn new(chain: Arc<RagChain>, chat_page: impl Into<Arc<str>>) -> Self {
        Self {
            chain,
            chat_page: chat_page.into(),
        }
    }
}

/// Read `chat.html` from `template_dir`, or fall back to the built-in page.
pub fn load_chat_page(template_dir: Option<&Path>) -> Result<String> {
    match template_dir {
        None => Ok(DEFAULT_CHAT_PAGE.to_string()),
        Some(dir) => {
            let path = dir.join("chat.html");
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read chat page: {}", path.display()))
        }
    }
}

/// Build the router with both routes bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/get", get(handlers::chat).post(handlers::chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server wrapping the state and serving on a TCP listener.
pub struct ChatServer {
    state: AppState,
}

impl ChatServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Bind `addr` and serve until Ctrl-C.
    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server encountered an error")?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
