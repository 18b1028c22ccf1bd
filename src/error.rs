//! Error taxonomy for the fan control engine.
//!
//! Store implementations report [`StoreError`]; the engine maps those into
//! [`Error::StoreUnavailable`] tagged with the ingestion [`Stage`] that failed,
//! so callers can tell "reading rejected" apart from "reading accepted, derived
//! state stale".

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ---

/// Failure reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    // ---
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Step of an engine operation that touched a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Step 1 of ingestion; nothing was persisted.
    Reading,
    /// Device fetch-or-create and relay/last_seen update.
    Device,
    /// Daily rollup fetch, recomputation or write.
    Rollup,
    /// Read-only lookups (series, listings).
    Query,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            Stage::Reading => "reading",
            Stage::Device => "device",
            Stage::Rollup => "rollup",
            Stage::Query => "query",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum Error {
    // ---
    /// Direct lookup of a device that does not exist.
    #[error("device not found: {0}")]
    NotFound(String),

    /// Missing or malformed input, rejected before any persistence.
    #[error("validation error: {0}")]
    Validation(String),

    /// A store collaborator failed while executing `stage`.
    #[error("store unavailable during {stage} step: {source}")]
    StoreUnavailable {
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl Error {
    /// Stage that failed, for store errors.
    pub fn stage(&self) -> Option<Stage> {
        // ---
        match self {
            Error::StoreUnavailable { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Tag store results with the stage they belong to.
pub trait StoreResultExt<T> {
    fn during(self, stage: Stage) -> Result<T>;
}

impl<T> StoreResultExt<T> for std::result::Result<T, StoreError> {
    fn during(self, stage: Stage) -> Result<T> {
        self.map_err(|source| Error::StoreUnavailable { stage, source })
    }
}
