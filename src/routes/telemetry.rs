//! `/api/telemetry`: reading ingestion and charting series.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{Engine, RawReading, Result, Window};

// ---

pub fn router() -> Router<Arc<Engine>> {
    // ---
    Router::new().route("/api/telemetry", get(series).post(ingest))
}

/// Query parameters for the series endpoint
#[derive(Debug, Deserialize)]
struct SeriesQuery {
    /// `1h`, `24h` or `7d`; defaults to `1h`.
    timespan: Option<String>,
    device_id: Option<String>,
}

async fn series(
    Query(params): Query<SeriesQuery>,
    State(engine): State<Arc<Engine>>,
) -> Result<impl IntoResponse> {
    // ---
    debug!("GET /api/telemetry {:?}", params);

    let window = match params.timespan.as_deref() {
        Some(s) => s.parse::<Window>()?,
        None => Window::Hour,
    };
    let points = engine
        .build_series(window, params.device_id.as_deref())
        .await?;

    Ok(Json(points))
}

async fn ingest(
    State(engine): State<Arc<Engine>>,
    Json(raw): Json<RawReading>,
) -> Result<impl IntoResponse> {
    // ---
    let reading = engine.ingest(raw).await?;
    info!(
        "POST /api/telemetry - accepted reading {} from {}",
        reading.id, reading.device_id
    );

    Ok((StatusCode::CREATED, Json(reading)))
}
