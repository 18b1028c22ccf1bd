//! `/api/devices`: device state, manual control and policy evaluation.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Device, Engine, Error, RelayCommand, Result};

// ---

pub fn router() -> Router<Arc<Engine>> {
    // ---
    Router::new()
        .route("/api/devices", get(list))
        .route("/api/devices/{id}", get(retrieve))
        .route("/api/devices/{id}/command", get(command))
        .route("/api/devices/{id}/set_relay", post(set_relay))
        .route("/api/devices/{id}/decide", get(decide))
}

async fn list(State(engine): State<Arc<Engine>>) -> Result<impl IntoResponse> {
    Ok(Json(engine.devices().await?))
}

async fn retrieve(
    Path(id): Path<String>,
    State(engine): State<Arc<Engine>>,
) -> Result<impl IntoResponse> {
    Ok(Json(engine.device(&id).await?))
}

/// Polled by devices to learn the relay state they should apply.
async fn command(
    Path(id): Path<String>,
    State(engine): State<Arc<Engine>>,
) -> Result<impl IntoResponse> {
    Ok(Json(engine.device_command(&id).await?))
}

/// Response body for `set_relay`
#[derive(Debug, Serialize)]
struct DeviceUpdated {
    // ---
    status: &'static str,
    #[serde(flatten)]
    device: Device,
}

async fn set_relay(
    Path(id): Path<String>,
    State(engine): State<Arc<Engine>>,
    Json(cmd): Json<RelayCommand>,
) -> Result<impl IntoResponse> {
    // ---
    debug!("POST /api/devices/{}/set_relay {:?}", id, cmd);
    let device = engine.configure_device(&id, &cmd).await?;

    Ok(Json(DeviceUpdated {
        status: "device updated",
        device,
    }))
}

// Taken as text so a missing or malformed value gets the JSON error body.
#[derive(Debug, Deserialize)]
struct DecideQuery {
    temperature: Option<String>,
}

impl DecideQuery {
    fn temperature(&self) -> Result<f64> {
        // ---
        let raw = self
            .temperature
            .as_deref()
            .ok_or_else(|| Error::Validation("temperature is required".into()))?;
        raw.trim()
            .parse()
            .map_err(|_| Error::Validation(format!("temperature must be a number, got '{raw}'")))
    }
}

/// Dry-run of the control policy against the stored device.
async fn decide(
    Path(id): Path<String>,
    Query(params): Query<DecideQuery>,
    State(engine): State<Arc<Engine>>,
) -> Result<impl IntoResponse> {
    Ok(Json(engine.decide_control(&id, params.temperature()?).await?))
}
