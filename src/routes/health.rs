// src/routes/health.rs
//! Liveness endpoint for the fanflow backend.
//!
//! `/health` is used by container orchestrators and CI to verify the service
//! is up. It reports the engine's day-boundary offset and rollup strategy so a
//! misconfigured deployment is visible at a glance, and never touches a store.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{Engine, RollupStrategy};

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    utc_offset_minutes: i32,
    rollup_strategy: RollupStrategy,
}

/// Handle `GET /health`.
async fn health(State(engine): State<Arc<Engine>>) -> Json<HealthResponse> {
    // ---
    let settings = engine.settings();
    Json(HealthResponse {
        status: "ok",
        utc_offset_minutes: settings.utc_offset.local_minus_utc() / 60,
        rollup_strategy: settings.rollup_strategy,
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<Arc<Engine>> {
    Router::new().route("/health", get(health))
}
