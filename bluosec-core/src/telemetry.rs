//! Live controller state read by the telemetry builders.

use serde::{Deserialize, Serialize};

/// Snapshot of the controller's live state.
///
/// Builders read it and never mutate it. Widths follow the controller's own
/// counters; builders split or truncate them onto the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Speed limit currently in force, km/h.
    pub actual_max_speed: u8,
    pub brake: bool,
    pub motor_state: u8,
    pub battery_voltage: u8,
    /// Electrical revolutions per second.
    pub er_speed: u16,
    /// Vehicle speed, km/h.
    pub speed: u32,
    pub battery_current: u16,
    pub sum_torque: u16,
    /// Duty cycle setpoint.
    pub setpoint: u16,
    pub setpoint_state: u8,
    /// Seconds, wrapping.
    pub uptime: u8,

    pub pas_active: u8,
    pub pas_dir: u8,
    pub correction_value: u8,
    /// Raw q-axis current; sent as `iq >> 2`.
    pub iq_current: u16,
    pub throttle: u16,
    pub current_target: u32,
    /// Smoothed ticks between PAS interrupts.
    pub current_ramp: u16,
    pub pas_high_counter: u16,
    /// Ticks between PAS interrupts.
    pub pas_counter: u16,
    pub virtual_er_speed: u16,

    pub hall_currents: [u8; 6],
    pub hall_order: [u8; 6],
}

/// Source of live telemetry snapshots.
pub trait TelemetrySource: Send + Sync {
    fn snapshot(&self) -> Telemetry;
}

impl TelemetrySource for Telemetry {
    fn snapshot(&self) -> Telemetry {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml() {
        let telemetry: Telemetry = serde_yaml::from_str("speed: 23\nbrake: true\n").unwrap();
        assert_eq!(telemetry.speed, 23);
        assert!(telemetry.brake);
        assert_eq!(telemetry.hall_order, [0; 6]);
    }

    #[test]
    fn test_static_source() {
        let source = Telemetry {
            uptime: 9,
            ..Default::default()
        };
        assert_eq!(source.snapshot().uptime, 9);
    }
}
