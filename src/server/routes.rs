use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::clock::{ServerTimeResponse, TimeSource};
use crate::control::{BroadcastController, ControlAck, ControlRequest, ADMIN_TOKEN_HEADER};
use crate::error::{log_control_error, ControlError, ErrorCode};
use crate::round::{validate_room_id, RoundDescriptor};
use crate::store::{MemoryRoundStore, RoundStore};
use crate::telemetry::{self, DiagnosticError, TelemetrySnapshot};

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct ServerState {
    controller: Arc<BroadcastController<MemoryRoundStore>>,
    clock: Arc<dyn TimeSource>,
    token: Option<Arc<String>>,
    started: Instant,
}

impl ServerState {
    /// An empty or absent `admin_token` leaves the control endpoint open.
    pub fn new(
        store: Arc<MemoryRoundStore>,
        clock: Arc<dyn TimeSource>,
        admin_token: Option<String>,
        start_lead_ms: i64,
    ) -> Self {
        Self {
            controller: Arc::new(BroadcastController::new(
                store,
                clock.clone(),
                start_lead_ms,
            )),
            clock,
            token: admin_token.filter(|t| !t.is_empty()).map(Arc::new),
            started: Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<MemoryRoundStore> {
        self.controller.store()
    }

    pub fn requires_token(&self) -> bool {
        self.token.is_some()
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let Some(expected) = &self.token else {
            return Ok(());
        };
        match extract_token(headers, query_token) {
            Some(value) if value == **expected => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    BadRequest(String),
    ServiceUnavailable(String),
    BadGateway(String),
}

impl From<ControlError> for HttpServerError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Unauthorized => Self::Unauthorized,
            ControlError::MissingField { .. }
            | ControlError::InvalidField { .. }
            | ControlError::UnknownCommand { .. } => Self::BadRequest(err.message()),
            ControlError::StoreUnavailable { .. } => Self::ServiceUnavailable(err.message()),
            ControlError::Transport { .. } => Self::BadGateway(err.message()),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token".into()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_ms: u64,
    pub rooms: usize,
    pub auth_required: bool,
}

/// Metrics endpoint response payload.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub rooms: usize,
    pub diagnostics: TelemetrySnapshot,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/metrics/stream", get(metrics_stream))
        .route("/api/time", get(server_time))
        .route("/api/broadcast", post(broadcast))
        .route("/api/rooms/:room_id", get(room_snapshot))
        .route("/api/rooms/:room_id/stream", get(room_stream))
        .with_state(state)
}

/// Run the HTTP server loop on `addr` until Ctrl+C.
pub async fn run_http_server(state: ServerState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", addr))?;
    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: ServerState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let local = listener.local_addr().context("reading listener address")?;
    log::info!(
        "[HTTP] serving on {} (control token {})",
        local,
        if state.requires_token() { "required" } else { "not set" }
    );

    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving HTTP router")?;
    Ok(())
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_ms: state.started.elapsed().as_millis() as u64,
        rooms: state.store().room_count(),
        auth_required: state.requires_token(),
    })
}

pub async fn metrics(
    State(state): State<ServerState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    Ok(Json(MetricsResponse {
        rooms: state.store().room_count(),
        diagnostics: telemetry::hub().snapshot(),
    }))
}

pub async fn metrics_stream(
    State(state): State<ServerState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::EventStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(sse::telemetry_stream())
}

pub async fn server_time(State(state): State<ServerState>) -> Json<ServerTimeResponse> {
    Json(ServerTimeResponse {
        server_time: state.clock.now_ms(),
    })
}

pub async fn broadcast(
    State(state): State<ServerState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ControlAck>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let request = serde_json::from_slice::<ControlRequest>(&body)
        .map_err(|err| HttpServerError::BadRequest(format!("invalid request body: {}", err)))?;

    let command = request.into_command().map_err(|err| {
        log_control_error(&err, "POST /api/broadcast");
        telemetry::hub().record_error(DiagnosticError::Control, err.message());
        HttpServerError::from(err)
    })?;

    state
        .controller
        .apply(command)
        .map(Json)
        .map_err(HttpServerError::from)
}

pub async fn room_snapshot(
    State(state): State<ServerState>,
    Path(room_id): Path<String>,
) -> Result<Json<Option<RoundDescriptor>>, HttpServerError> {
    validate_room_id(&room_id)?;
    state
        .store()
        .get(&room_id)
        .map(Json)
        .map_err(|err| HttpServerError::ServiceUnavailable(err.message()))
}

pub async fn room_stream(
    State(state): State<ServerState>,
    Path(room_id): Path<String>,
) -> Result<sse::EventStream, HttpServerError> {
    validate_room_id(&room_id)?;
    Ok(sse::room_stream(state.store().as_ref(), &room_id))
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}
