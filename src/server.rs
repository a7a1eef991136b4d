//! HTTP/WebSocket server delivering correlation frames to viewers.
//!
//! This module provides an HTTP server that:
//! - Upgrades `GET /ws` to a WebSocket and subscribes it to the broadcaster
//! - Reports liveness on `GET /health`
//! - Reports session counters on `GET /stats`
//!
//! # Architecture
//!
//! ```text
//! Scheduler ──publish──▶ Broadcaster ──queue──▶ socket task ──▶ viewer
//!                                     ──queue──▶ socket task ──▶ viewer
//! ```

use crate::broadcast::Broadcaster;
use crate::scheduler::{SchedulerHandle, SchedulerState};
use crate::stats::{SharedStats, StatsSnapshot};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderValue,
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Frames buffered per connection before it is dropped as too slow
    pub subscriber_queue: usize,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(host: impl Into<String>, port: u16, subscriber_queue: usize) -> Self {
        Self {
            host: host.into(),
            port,
            subscriber_queue,
        }
    }
}

/// Shared server state
pub struct ServerState {
    broadcaster: Arc<Broadcaster>,
    stats: SharedStats,
    scheduler: Option<SchedulerHandle>,
    subscriber_queue: usize,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub subscribers: usize,
}

/// Stats response
#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerState>,
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.broadcaster.subscriber_count(),
    })
}

/// GET /stats
async fn session_stats(State(state): State<Arc<ServerState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.stats.snapshot(),
        scheduler: state.scheduler.as_ref().map(|h| h.state()),
    })
}

/// GET /ws
async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forward queued frames to one viewer until either side goes away.
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(state.subscriber_queue.max(1));
    let id = state.broadcaster.subscribe(tx);

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(payload) => {
                    if let Err(e) = sender.send(Message::Text(payload.to_string())).await {
                        tracing::warn!(subscriber = %id, "Failed to send frame: {}", e);
                        break;
                    }
                }
                None => {
                    // Broadcaster dropped us: stream ended or we fell behind
                    if let Err(e) = sender.send(Message::Close(None)).await {
                        tracing::debug!(subscriber = %id, "Failed to send close frame: {}", e);
                    }
                    break;
                }
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(subscriber = %id, "WebSocket closed by client");
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sender.send(Message::Pong(data)).await {
                        tracing::warn!(subscriber = %id, "Failed to send pong: {}", e);
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(subscriber = %id, "WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    state.broadcaster.unsubscribe(id);
}

/// Build the router.
pub fn router(
    broadcaster: Arc<Broadcaster>,
    stats: SharedStats,
    scheduler: Option<SchedulerHandle>,
    subscriber_queue: usize,
) -> Router {
    let state = Arc::new(ServerState {
        broadcaster,
        stats,
        scheduler,
        subscriber_queue,
    });

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(session_stats))
        .route("/ws", get(handle_websocket))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                    HeaderValue::from_static("http://localhost:3000"),
                    HeaderValue::from_static("http://localhost:5173"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
    stats: SharedStats,
    scheduler: Option<SchedulerHandle>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(broadcaster, stats, scheduler, config.subscriber_queue);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Frame server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
