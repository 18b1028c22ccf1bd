//! HTTP adapter over the [`Engine`].
//!
//! Each sibling module owns its handlers and exports a subrouter; this gateway
//! merges them and installs the shared state, so `main.rs` only needs
//! [`router`].

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{Engine, Error};

mod daily_logs;
mod devices;
mod health;
mod telemetry;

// ---

pub fn router(engine: Arc<Engine>) -> Router {
    // ---
    Router::new()
        .merge(telemetry::router())
        .merge(devices::router())
        .merge(daily_logs::router())
        .merge(health::router())
        .with_state(engine)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // ---
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let body = json!({
            "error": self.to_string(),
            "stage": self.stage(),
        });
        (status, Json(body)).into_response()
    }
}
