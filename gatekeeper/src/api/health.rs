//! GET /health — unauthenticated liveness probe (SPEC_FULL.md §4.7),
//! reporting process uptime and schema version in the style every
//! deployable service in this codebase exposes.

use crate::db::schema::current_schema_version;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub schema_version: i32,
    pub uptime_seconds: i64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        module: "gatekeeper",
        version: env!("CARGO_PKG_VERSION"),
        schema_version: current_schema_version(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds().max(0),
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
