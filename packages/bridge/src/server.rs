// ABOUTME: Axum router and WebSocket handling for the realtime bridge
// ABOUTME: One gateway per connection; requests run sequentially on a worker aborted at disconnect

use crate::binding::{resolve, Binding, ConnectParams};
use crate::protocol::{parse_frame, ErrorCode, InboundFrame, OutboundFrame};
use crate::session::Session;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use runbox_sandbox::{ContainerGateway, GatewayConfig, RuntimeConnector};
use runbox_storage::{InstanceRegistry, SqliteCompletionLog};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Requests a client may queue; beyond this they are answered with `busy`
const REQUEST_BUFFER: usize = 16;
const OUTBOUND_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// How long a project connection waits for its sandbox to come up
    pub address_wait: Duration,
    pub address_poll_interval: Duration,
    pub gateway: GatewayConfig,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            address_wait: Duration::from_secs(60),
            address_poll_interval: Duration::from_millis(250),
            gateway: GatewayConfig::default(),
        }
    }
}

pub struct BridgeState {
    pub completions: SqliteCompletionLog,
    pub registry: Arc<dyn InstanceRegistry>,
    pub connector: Arc<dyn RuntimeConnector>,
    pub settings: BridgeSettings,
}

pub fn router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the bridge until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<BridgeState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "runbox-bridge"
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BridgeState>>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

/// Bind the connection, greet, then pump frames until the client leaves
async fn handle_socket(socket: WebSocket, state: Arc<BridgeState>, params: ConnectParams) {
    let (mut sink, mut stream) = socket.split();

    let session = match open_session(&state, &params).await {
        Ok(session) => session,
        Err(frame) => {
            let _ = sink.send(Message::Text(frame.to_text().into())).await;
            let _ = sink.close().await;
            return;
        }
    };
    let session = Arc::new(session);
    info!("Bridge client connected to {}", session.address());

    let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER);
    let (req_tx, mut req_rx) = mpsc::channel::<InboundFrame>(REQUEST_BUFFER);

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(Message::Text(frame.to_text().into())).await.is_err() {
                break;
            }
        }
    });

    // One request in flight per connection
    let worker_out = out_tx.clone();
    let worker_session = session.clone();
    let worker = tokio::spawn(async move {
        while let Some(frame) = req_rx.recv().await {
            let response = worker_session.respond(frame).await;
            if worker_out.send(response).await.is_err() {
                break;
            }
        }
    });

    let binding_frame = OutboundFrame::connected(
        params.project.clone().filter(|p| !p.is_empty()),
        session.address(),
    );
    let _ = out_tx.send(binding_frame).await;

    loop {
        tokio::select! {
            _ = &mut writer => break,
            msg = stream.next() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => match parse_frame(text.as_str()) {
                        Ok(frame) => match req_tx.try_send(frame) {
                            Ok(()) => {}
                            Err(TrySendError::Full(frame)) => {
                                let busy = OutboundFrame::error(
                                    frame.id,
                                    ErrorCode::Busy,
                                    format!("too many pending requests (limit {})", REQUEST_BUFFER),
                                );
                                if out_tx.send(busy).await.is_err() {
                                    break;
                                }
                            }
                            Err(TrySendError::Closed(_)) => break,
                        },
                        Err(error_frame) => {
                            if out_tx.send(error_frame).await.is_err() {
                                break;
                            }
                        }
                    },
                    Message::Binary(_) => {
                        let frame = OutboundFrame::error(
                            None,
                            ErrorCode::BadRequest,
                            "binary frames are not supported",
                        );
                        if out_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    // Abandon whatever the worker is doing; teardown never waits on the container
    worker.abort();
    writer.abort();
    info!("Bridge client disconnected from {}", session.address());
}

async fn open_session(state: &BridgeState, params: &ConnectParams) -> Result<Session, OutboundFrame> {
    let Binding { address, project } = resolve(
        params,
        &state.completions,
        state.registry.as_ref(),
        state.settings.address_wait,
        state.settings.address_poll_interval,
    )
    .await
    .map_err(|e| {
        warn!("Rejected bridge connection: {}", e);
        OutboundFrame::error(None, ErrorCode::Unavailable, e.to_string())
    })?;

    let runtime = state.connector.connect(&address).map_err(|e| {
        warn!("Cannot reach container runtime at {}: {}", address, e);
        OutboundFrame::error(None, ErrorCode::Transport, e.to_string())
    })?;

    let gateway = ContainerGateway::new(runtime, state.settings.gateway.clone());
    Ok(Session::new(gateway, address, project.as_ref()))
}
