// WDB - Workflow Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON-RPC server with a work-queue dispatch loop.
//!
//! Axum handlers stay thin: each POST is forwarded over an mpsc channel to
//! a single dispatch task that owns the [`MethodHandler`], and the response
//! travels back on a oneshot. GET `/ws` upgrades to a WebSocket that pushes
//! debugger lifecycle events, plus a session's log stream when the query
//! string names one.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json as JsonExtract, Query, State,
    },
    response::{Json as JsonResponse, Response},
    routing::{get, post},
    Router,
};
use eyre::Result;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};
use wdb_common::types::SessionKey;

use super::{
    methods::MethodHandler,
    types::{error_codes, RpcError, RpcId, RpcRequest, RpcResponse},
    utils::resolve_port,
};
use crate::core::Debugger;

/// Handle to the running RPC server
#[derive(Debug)]
pub struct RpcServerHandle {
    /// Address the server is listening on
    pub addr: SocketAddr,
    /// Shutdown signal
    shutdown_tx: oneshot::Sender<()>,
}

impl RpcServerHandle {
    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Gracefully shutdown the RPC server
    pub fn shutdown(self) -> Result<()> {
        if self.shutdown_tx.send(()).is_err() {
            warn!("RPC server already shut down");
        }
        Ok(())
    }
}

/// Thread-safe RPC state for Axum
#[derive(Clone)]
struct RpcState {
    /// Channel to send work to the dispatch task
    tx: mpsc::Sender<Work>,
    /// Debugger for event/log subscriptions on the WebSocket path
    debugger: Arc<Debugger>,
}

/// Work item sent to the dispatch task
struct Work {
    /// The RPC request to handle
    req: RpcRequest,
    /// Channel to send back the response
    rsp: oneshot::Sender<RpcResponse>,
}

/// Debug RPC server exposing a [`Debugger`] over JSON-RPC.
pub struct DebugRpcServer {
    debugger: Arc<Debugger>,
    method_handler: Arc<MethodHandler>,
}

impl DebugRpcServer {
    /// Create a new debug RPC server
    pub fn new(debugger: Arc<Debugger>) -> Self {
        let method_handler = Arc::new(MethodHandler::new(debugger.clone()));
        Self { debugger, method_handler }
    }

    /// Start the RPC server on the resolved port (`WDB_PORT` or default,
    /// searching upward when taken)
    pub async fn start(self) -> Result<RpcServerHandle> {
        let port = resolve_port()?;
        self.start_on_port(port).await
    }

    /// Start the RPC server on a specific port
    pub async fn start_on_port(self, port: u16) -> Result<RpcServerHandle> {
        let (tx, mut rx) = mpsc::channel::<Work>(1024);

        let method_handler = self.method_handler.clone();
        tokio::spawn(async move {
            info!("starting RPC dispatch task");

            while let Some(Work { req, rsp }) = rx.recv().await {
                let id = req.id.clone();
                let response = match method_handler.handle_method(&req.method, req.params) {
                    Ok(result) => RpcResponse::success(id, result),
                    Err(error) => RpcResponse::failure(id, error),
                };

                // Ignore send failure if the client went away.
                if rsp.send(response).is_err() {
                    warn!("client dropped connection before response");
                }
            }

            info!("RPC dispatch task shutting down");
        });

        let app = Router::new()
            .route("/", post(handle_rpc_request))
            .route("/health", get(health_check))
            .route("/ws", get(ws_handler))
            .layer(CorsLayer::permissive())
            .with_state(RpcState { tx, debugger: self.debugger.clone() });

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
            {
                error!("RPC server failed: {e}");
            }
        });

        info!("debug RPC server started on {actual_addr}");

        Ok(RpcServerHandle { addr: actual_addr, shutdown_tx })
    }
}

/// Handle RPC requests by forwarding them to the dispatch task
async fn handle_rpc_request(
    State(state): State<RpcState>,
    JsonExtract(request): JsonExtract<RpcRequest>,
) -> JsonResponse<RpcResponse> {
    if request.jsonrpc != "2.0" {
        return JsonResponse(RpcResponse::failure(
            request.id,
            RpcError {
                code: error_codes::INVALID_REQUEST,
                message: "Invalid Request - JSON-RPC version must be 2.0".to_string(),
                data: None,
            },
        ));
    }

    let (rsp_tx, rsp_rx) = oneshot::channel();
    let request_id = request.id.clone();
    if state.tx.send(Work { req: request, rsp: rsp_tx }).await.is_err() {
        error!("RPC dispatch task is dead");
        return JsonResponse(RpcResponse::failure(
            request_id,
            RpcError {
                code: error_codes::INTERNAL_ERROR,
                message: "Internal error - dispatch task unavailable".to_string(),
                data: None,
            },
        ));
    }

    let response = match rsp_rx.await {
        Ok(resp) => resp,
        Err(_) => {
            error!("dispatch task dropped response channel");
            RpcResponse::failure(
                RpcId::String("unknown".to_string()),
                RpcError {
                    code: error_codes::INTERNAL_ERROR,
                    message: "Internal error - dispatch communication failed".to_string(),
                    data: None,
                },
            )
        }
    };

    JsonResponse(response)
}

/// Health check endpoint
async fn health_check() -> JsonResponse<serde_json::Value> {
    JsonResponse(serde_json::json!({
        "status": "healthy",
        "service": "wdb-debug-rpc-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Optional session addressing on the WebSocket query string. When both
/// ids are present the socket also streams that session's log entries.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WsQuery {
    workflow_id: Option<String>,
    execution_id: Option<String>,
}

impl WsQuery {
    fn session_key(&self) -> Option<SessionKey> {
        match (&self.workflow_id, &self.execution_id) {
            (Some(wf), Some(exec)) => Some(SessionKey::new(wf, exec)),
            _ => None,
        }
    }
}

/// Upgrade to a WebSocket streaming debugger events as JSON text frames
async fn ws_handler(
    State(state): State<RpcState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let events = state.debugger.subscribe_events();
    let logs = query
        .session_key()
        .and_then(|key| state.debugger.session(&key).ok())
        .map(|session| session.logger().subscribe());
    ws.on_upgrade(move |socket| stream_events(socket, events, logs))
}

async fn stream_events(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<wdb_common::types::DebugEvent>,
    logs: Option<broadcast::Receiver<wdb_common::types::LogEntry>>,
) {
    // A never-firing dummy channel keeps the select arms uniform when no
    // session logs were requested. Its sender must stay alive or recv()
    // would resolve to Closed in a tight loop.
    let (dummy_tx, dummy_rx) = broadcast::channel(1);
    let mut logs = logs.unwrap_or(dummy_rx);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            entry = logs.recv() => match entry {
                Ok(entry) => {
                    let Ok(text) = serde_json::to_string(&entry) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "log subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    // Session stopped; keep the event stream alive on the
                    // never-firing dummy channel.
                    logs = dummy_tx.subscribe();
                }
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}

/// Create and start a debug RPC server with auto-port detection
pub async fn start_debug_server(debugger: Arc<Debugger>) -> Result<RpcServerHandle> {
    let server = DebugRpcServer::new(debugger);
    server.start().await
}
