//! `/api/daily-logs`: per-device daily rollups.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{Engine, Result};

// ---

pub fn router() -> Router<Arc<Engine>> {
    // ---
    Router::new().route("/api/daily-logs", get(list))
}

/// Query parameters for the rollup listing
#[derive(Debug, Deserialize)]
struct DailyLogQuery {
    /// Days before today to include; omitted means today only.
    days: Option<u32>,
    device_id: Option<String>,
}

async fn list(
    Query(params): Query<DailyLogQuery>,
    State(engine): State<Arc<Engine>>,
) -> Result<impl IntoResponse> {
    // ---
    let rollups = engine
        .daily_rollups(params.device_id.as_deref(), params.days.unwrap_or(0))
        .await?;

    Ok(Json(rollups))
}
