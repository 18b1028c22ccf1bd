//! Fan control telemetry engine.
//!
//! Devices report temperature and humidity; on every reading the engine decides
//! whether to flip the device's fan relay (two-threshold hysteresis), refreshes
//! the device's daily rollup, and on demand rebuilds a fixed-cadence series for
//! charting.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): sibling
//! modules import what they need from this gateway (`crate::...`) rather than
//! from each other's internals.
//! - `control`, `rollup`, `series`: pure algorithms
//! - `engine`: ingestion coordinator and read operations
//! - `store`: storage capabilities and their backends
//! - `routes`: axum adapter
//! - `config`, `schema`: startup concerns used by `main.rs`

pub mod calendar;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod models;
pub mod rollup;
pub mod routes;
pub mod schema;
pub mod series;
pub mod store;

pub use config::Config;
pub use control::ControlDecision;
pub use engine::{Engine, EngineSettings};
pub use error::{Error, Result, Stage, StoreError};
pub use models::{DailyRollup, Device, DeviceCommand, DevicePatch, RawReading, Reading, RelayCommand};
pub use rollup::RollupStrategy;
pub use series::{SeriesPoint, Window};
