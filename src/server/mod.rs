//! HTTP surface of the compsync server.
//!
//! Hosts the authoritative clock (`/api/time`), the operator control
//! endpoint (`/api/broadcast`) and the round store feeds
//! (`/api/rooms/{room}` and its SSE stream), plus health and telemetry.

mod routes;
mod sse;

pub use routes::{
    build_router, run_http_server, serve, AuthQuery, HealthResponse, HttpServerError,
    MetricsResponse, ServerState,
};
pub use sse::EventStream;
