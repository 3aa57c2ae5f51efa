//! HTTP control surface.
//!
//! Accepts single-symbol commands and writes them to the board, and serves
//! the most recent emitted snapshots. Nothing here touches the live snapshot;
//! the only shared resources are the transport write half and the recent
//! readings buffer.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::sink::{RecentReadings, SinkSet};
use crate::snapshot::Snapshot;
use crate::transport::{CommandWriter, TransportError};

/// Command accepted by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `1`
    Enable,
    /// `0`
    Disable,
}

impl Command {
    /// Parse a client-supplied command value. Only `"1"` and `"0"` are accepted.
    pub fn parse(value: &str) -> Result<Self, CommandError> {
        match value {
            "1" => Ok(Command::Enable),
            "0" => Ok(Command::Disable),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Byte written to the transport.
    pub fn symbol(&self) -> u8 {
        match self {
            Command::Enable => b'1',
            Command::Disable => b'0',
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol() as char)
    }
}

/// Error type for command handling
#[derive(Debug)]
pub enum CommandError {
    Unknown(String),
    Transport(TransportError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(value) => {
                write!(f, "Unknown command '{}' (expected \"1\" or \"0\")", value)
            }
            CommandError::Transport(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<TransportError> for CommandError {
    fn from(e: TransportError) -> Self {
        CommandError::Transport(e)
    }
}

/// Write one command symbol to the board. Does not wait for a reply.
pub async fn send_command(writer: &CommandWriter, command: Command) -> Result<(), CommandError> {
    writer.write_raw(&[command.symbol()]).await?;
    tracing::info!(command = %command, "Command sent to board");
    Ok(())
}

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct ControlState {
    pub commands: CommandWriter,
    pub readings: RecentReadings,
    pub sinks: SinkSet,
}

/// Build the control router.
pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/command", post(post_command))
        .route("/readings", get(latest_readings))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind the control listener.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Control surface listening on {}", addr);
    Ok(listener)
}

/// Serve the control surface until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: ControlState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    success: bool,
    command: String,
}

/// Send a command to the board
async fn post_command(
    State(state): State<Arc<ControlState>>,
    body: String,
) -> Result<Json<CommandResponse>, AppError> {
    let request: CommandRequest = serde_json::from_str(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid JSON: {}", e)))?;

    let value = match &request.command {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };

    let command = Command::parse(&value).map_err(|e| AppError::ValidationError(e.to_string()))?;

    send_command(&state.commands, command)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(Json(CommandResponse {
        success: true,
        command: command.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReadingsResponse {
    success: bool,
    count: usize,
    data: Vec<Snapshot>,
}

/// Latest emitted snapshots, newest first
async fn latest_readings(
    State(state): State<Arc<ControlState>>,
    Query(query): Query<ReadingsQuery>,
) -> impl IntoResponse {
    // Missing, unparsable or zero limits fall back to one reading
    let limit = query
        .limit
        .and_then(|l| l.trim().parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(1);

    let data = state.readings.latest(limit);

    (
        [
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, proxy-revalidate",
            ),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Json(ReadingsResponse {
            success: true,
            count: data.len(),
            data,
        }),
    )
}

/// Health check endpoint (liveness)
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "eps-collector",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint - verifies network sinks are connected
async fn readiness_check(
    State(state): State<Arc<ControlState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if state.sinks.is_ready() {
        Ok(Json(serde_json::json!({
            "status": "ready",
            "service": "eps-collector",
            "sinks": state.sinks.names(),
        })))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

// Error handling

#[derive(Debug)]
enum AppError {
    ValidationError(String),
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({
            "success": false,
            "error": message
        }))).into_response()
    }
}
