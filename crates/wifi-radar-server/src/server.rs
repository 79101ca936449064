//! HTTP surface: viewer WebSocket, health and latest-snapshot endpoints, and
//! an optional static renderer directory.

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info, warn};

use crate::driver::SharedStatus;
use crate::publisher::SnapshotPublisher;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub publisher: SnapshotPublisher,
    pub status: SharedStatus,
    /// Upper bound on one WebSocket send before the viewer is dropped.
    pub send_timeout: Duration,
    /// Held by every viewer task through its clone of the state.
    pub connections: ConnectionTracker,
}

/// Keeps a [`ConnectionDrain`] open while any clone is alive.
#[derive(Clone)]
pub struct ConnectionTracker {
    _alive: mpsc::Sender<()>,
}

/// Resolves once every [`ConnectionTracker`] clone has been dropped.
pub struct ConnectionDrain {
    rx: mpsc::Receiver<()>,
}

/// A tracker for [`AppState`] and the drain `main` awaits after the
/// HTTP server has stopped.
pub fn connection_tracker() -> (ConnectionTracker, ConnectionDrain) {
    let (tx, rx) = mpsc::channel(1);
    (ConnectionTracker { _alive: tx }, ConnectionDrain { rx })
}

impl ConnectionDrain {
    /// Wait up to `grace` for the remaining viewer tasks to finish.
    /// Returns `false` if some were still running when it expired.
    pub async fn wait(&mut self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.rx.recv()).await.is_ok()
    }
}

/// Build the router. `ui_dir`, when set, is served under `/ui`.
pub fn router(state: AppState, ui_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/api/v1/snapshot", get(latest_snapshot));

    if let Some(dir) = ui_dir {
        let ui = Router::new()
            .nest_service("/ui", ServeDir::new(dir))
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            ));
        app = app.merge(ui);
    }

    app.with_state(state)
}

/// Serve `app` until `shutdown` turns `true` or its sender is dropped.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            info!("HTTP server shutting down");
        })
        .await
}

// ── WebSocket ────────────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_viewer(socket, state))
}

async fn handle_viewer(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let Some((id, mut rx)) = state.publisher.subscribe() else {
        let _ = tokio::time::timeout(state.send_timeout, sink.send(Message::Close(None))).await;
        return;
    };
    info!(%id, viewers = state.publisher.viewer_count(), "viewer connected");

    loop {
        tokio::select! {
            payload = rx.recv() => match payload {
                Some(json) => {
                    let send = sink.send(Message::Text(json.to_string()));
                    match tokio::time::timeout(state.send_timeout, send).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            debug!(%id, error = %e, "viewer send failed");
                            break;
                        }
                        Err(_) => {
                            warn!(%id, "viewer send timed out");
                            break;
                        }
                    }
                }
                // Evicted or shutting down.
                None => {
                    let close = sink.send(Message::Close(None));
                    let _ = tokio::time::timeout(state.send_timeout, close).await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {} // ignore client messages
            },
        }
    }

    state.publisher.unsubscribe(id);
    info!(%id, "viewer disconnected");
}

// ── REST endpoints ───────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.status.read().clone();
    Json(serde_json::json!({
        "status": "ok",
        "source": status.source,
        "cycle": status.cycle,
        "networks": status.networks,
        "edges": status.edges,
        "empty_scans": status.empty_scans,
        "viewers": state.publisher.viewer_count(),
        "uptime_secs": status.started.elapsed().as_secs(),
    }))
}

async fn latest_snapshot(State(state): State<AppState>) -> Response {
    match state.publisher.latest_payload() {
        Some(json) => (
            [(header::CONTENT_TYPE, "application/json")],
            json.to_string(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
