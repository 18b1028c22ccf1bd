//! Hysteresis relay control.
//!
//! The relay turns on at or above `temp_threshold_high` and only turns off
//! again at or below `temp_threshold_low`, so readings hovering around one
//! threshold never make the fan chatter. Manual mode (`auto_mode == false`)
//! freezes the relay; manual changes go through `set_relay` instead.
//!
//! With inverted thresholds (`low > high`) the two branches still cannot both
//! fire for one reading because each one requires the opposite relay state.

use serde::Serialize;

use crate::models::{Device, Reading};

// ---

/// Outcome of evaluating one reading against a device's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlDecision {
    // ---
    pub relay_state: bool,
    pub changed: bool,
}

pub fn decide(reading: &Reading, device: &Device) -> ControlDecision {
    decide_for_temperature(reading.temperature, device)
}

/// Evaluate the policy for a bare temperature.
pub fn decide_for_temperature(temperature: f64, device: &Device) -> ControlDecision {
    // ---
    let current = device.relay_state;

    let next = if !device.auto_mode {
        current
    } else if temperature >= device.temp_threshold_high && !current {
        true
    } else if temperature <= device.temp_threshold_low && current {
        false
    } else {
        current
    };

    ControlDecision {
        relay_state: next,
        changed: next != current,
    }
}
