//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC method calls to the command handlers. A
//! `subscribe_events` call turns the connection into a notification stream
//! in addition to answering further requests.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tidal_rewards::RewardsError;
use tidal_types::events::Event;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::events::EventFilter;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Server-initiated event notification.
#[derive(Debug, Serialize)]
pub struct RpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: NotificationParams<'a>,
}

#[derive(Debug, Serialize)]
pub struct NotificationParams<'a> {
    pub subscription_id: &'a str,
    pub event: &'a Event,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn with_detail(code: i32, message: &str, detail: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::with_detail(-32602, "INVALID_PARAMS", detail)
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::with_detail(-32603, "INTERNAL_ERROR", detail)
    }

    // Rewards errors

    /// Unauthorized (-32001).
    pub fn unauthorized(detail: &str) -> Self {
        Self::with_detail(-32001, "UNAUTHORIZED", detail)
    }

    /// Invalid pool (-32002).
    pub fn invalid_pool(detail: &str) -> Self {
        Self::with_detail(-32002, "INVALID_POOL", detail)
    }

    /// Arithmetic overflow (-32003).
    pub fn arithmetic_overflow() -> Self {
        Self {
            code: -32003,
            message: "ARITHMETIC_OVERFLOW".to_string(),
            data: None,
        }
    }

    /// Invalid ratio (-32004).
    pub fn invalid_ratio(detail: &str) -> Self {
        Self::with_detail(-32004, "INVALID_RATIO", detail)
    }

    /// Claims paused (-32005).
    pub fn claims_paused() -> Self {
        Self {
            code: -32005,
            message: "CLAIMS_PAUSED".to_string(),
            data: None,
        }
    }

    /// Transfer failed (-32006).
    pub fn transfer_failed(detail: &str) -> Self {
        Self::with_detail(-32006, "TRANSFER_FAILED", detail)
    }

    /// Emission schedule error (-32007).
    pub fn emission_error(detail: &str) -> Self {
        Self::with_detail(-32007, "EMISSION_ERROR", detail)
    }
}

impl From<RewardsError> for RpcError {
    fn from(err: RewardsError) -> Self {
        let detail = err.to_string();
        match err {
            RewardsError::Unauthorized { .. } => RpcError::unauthorized(&detail),
            RewardsError::InvalidPool(_) => RpcError::invalid_pool(&detail),
            RewardsError::ArithmeticOverflow => RpcError::arithmetic_overflow(),
            RewardsError::InvalidRatio(_) => RpcError::invalid_ratio(&detail),
            RewardsError::InvalidInput(_) => RpcError::invalid_params(&detail),
            RewardsError::Paused => RpcError::claims_paused(),
            RewardsError::Transfer(_) => RpcError::transfer_failed(&detail),
            RewardsError::Store(_) => RpcError::internal_error(&detail),
            RewardsError::Emission(_) => RpcError::emission_error(&detail),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

async fn write_line<T: Serialize>(writer: &SharedWriter, message: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    let mut writer = writer.lock().await;
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, writer) = stream.into_split();
    let writer: SharedWriter = Arc::new(Mutex::new(writer));
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc != "2.0" => {
                RpcResponse::error(request.id, RpcError::invalid_request())
            }
            Ok(request) if request.method == "subscribe_events" => {
                subscribe(&state, &writer, request)
            }
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        write_line(&writer, &response).await?;
    }

    Ok(())
}

/// Start forwarding bus events matching the requested filter.
fn subscribe(state: &Arc<DaemonState>, writer: &SharedWriter, request: RpcRequest) -> RpcResponse {
    let filter = match commands::events::parse_filter(&request.params) {
        Ok(filter) => filter,
        Err(err) => return RpcResponse::error(request.id, err),
    };
    let subscription_id = state.event_bus.next_subscription_id();
    let receiver = state.event_bus.subscribe();
    tokio::spawn(forward_events(
        receiver,
        writer.clone(),
        filter,
        subscription_id.clone(),
    ));
    debug!(%subscription_id, "event subscription opened");
    RpcResponse::success(
        request.id,
        serde_json::json!({ "subscription_id": subscription_id }),
    )
}

async fn forward_events(
    mut receiver: broadcast::Receiver<Event>,
    writer: SharedWriter,
    filter: EventFilter,
    subscription_id: String,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if !filter.matches(&event) {
                    continue;
                }
                let notification = RpcNotification {
                    jsonrpc: "2.0",
                    method: "event",
                    params: NotificationParams {
                        subscription_id: &subscription_id,
                        event: &event,
                    },
                };
                if write_line(&writer, &notification).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(%subscription_id, skipped, "subscriber lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(%subscription_id, "event subscription closed");
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Collaborator commands
        "checkpoint" => commands::collaborator::checkpoint(&state, params).await,
        "report_shares" => commands::collaborator::report_shares(&state, params).await,

        // Claim commands
        "claim" => commands::claims::claim(&state, params).await,
        "claim_many" => commands::claims::claim_many(&state, params).await,
        "claim_all" => commands::claims::claim_all(&state, params).await,

        // Query commands
        "unclaimed_vault_rewards" => {
            commands::queries::unclaimed_vault_rewards(&state, params).await
        }
        "unclaimed_staking_rewards" => {
            commands::queries::unclaimed_staking_rewards(&state, params).await
        }
        "all_unclaimed_rewards" => commands::queries::all_unclaimed_rewards(&state, params).await,
        "pool_rewards_state" => commands::queries::pool_rewards_state(&state, params).await,
        "pending_rewards" => commands::queries::pending_rewards(&state, params).await,
        "current_rate" => commands::queries::current_rate(&state, params).await,
        "get_emission_schedule" => commands::queries::get_emission_schedule(&state).await,
        "get_funding_status" => commands::queries::get_funding_status(&state).await,

        // Admin commands
        "set_split" => commands::admin::set_split(&state, params).await,
        "set_vault_weights" => commands::admin::set_vault_weights(&state, params).await,
        "register_vault" => commands::admin::register_vault(&state, params).await,
        "set_staking_owner" => commands::admin::set_staking_owner(&state, params).await,
        "pause_claims" => commands::admin::pause_claims(&state, params).await,
        "unpause_claims" => commands::admin::unpause_claims(&state, params).await,
        "set_funding_wallet" => commands::admin::set_funding_wallet(&state, params).await,

        "subscribe_events" => Err(RpcError::invalid_request()),

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidal_types::{Address, PoolId};

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::claims_paused();
        assert_eq!(err.code, -32005);
        assert_eq!(err.message, "CLAIMS_PAUSED");

        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn test_rewards_error_mapping() {
        let err: RpcError = RewardsError::unauthorized(&Address::repeat(1), "set split").into();
        assert_eq!(err.code, -32001);
        let detail = err
            .data
            .as_ref()
            .and_then(|d| d.get("detail"))
            .and_then(|d| d.as_str())
            .expect("detail");
        assert!(detail.contains("set split"));

        let err: RpcError = RewardsError::InvalidPool(PoolId::Staking).into();
        assert_eq!(err.code, -32002);
        let err: RpcError = RewardsError::InvalidInput("x".to_string()).into();
        assert_eq!(err.code, -32602);
        let err: RpcError = RewardsError::Store("disk".to_string()).into();
        assert_eq!(err.code, -32603);
    }

    #[test]
    fn test_rpc_response_success() {
        let resp = RpcResponse::success(serde_json::json!(1), serde_json::json!({"ok": true}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_rpc_response_error() {
        let resp = RpcResponse::error(serde_json::json!(1), RpcError::internal_error("test"));
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let state = Arc::new(DaemonState::in_memory(&crate::tests::config()).expect("state"));
        let request: RpcRequest = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "no_such_method",
        }))
        .expect("request");
        let response = dispatch_request(state, request).await;
        assert_eq!(response.error.expect("error").code, -32601);
    }
}
