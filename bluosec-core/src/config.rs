//! In-memory configuration mirror.
//!
//! The mirror is the single source for snapshot reads and write
//! acknowledgments. It is loaded from EEPROM at start-up (see
//! [`crate::storage`]) and afterwards mutated only by write requests.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Wire scale of the PAS threshold.
pub const PAS_THRESHOLD_SCALE: f32 = 4.0;

/// Wire scale of both PID gains.
pub const PID_GAIN_SCALE: f32 = 2.0;

/// Ramp end travels as `ramp_end >> RAMP_END_SHIFT`.
pub const RAMP_END_SHIFT: u32 = 5;

/// Ramp start travels as `ramp_start >> RAMP_START_SHIFT`.
pub const RAMP_START_SHIFT: u32 = 6;

/// Quantizes a float to one byte: `round(value * scale)`, saturating.
pub fn quantize(value: f32, scale: f32) -> u8 {
    (value * scale).round().clamp(0.0, u8::MAX as f32) as u8
}

/// Inverse of [`quantize`].
pub fn dequantize(raw: u8, scale: f32) -> f32 {
    raw as f32 / scale
}

/// Controller configuration as held in RAM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Volatile, never persisted.
    pub offroad: u8,
    pub aca_flags: u16,
    pub battery_current_max: u16,
    /// Only the low byte is ever written.
    pub regen_current_max: u16,
    pub current_cal_a: u8,
    /// Read-only over the link.
    pub current_cal_b: u16,
    pub assist_level: u8,
    pub throttle_min: u8,
    pub throttle_max: u8,
    pub motor_specific_angle: u8,
    pub pas_threshold: f32,
    pub pid_gain_p: f32,
    pub pid_gain_i: f32,
    pub ramp_end: u16,
    pub ramp_start: u16,
    /// km/h.
    pub max_speed_default: u8,
    pub max_speed_without_pas: u8,
    pub max_speed_with_throttle_override: u8,
    /// Millimetres.
    pub wheel_circumference: u16,
    pub gear_ratio: u16,
    /// Magic byte found in (or written to) the EEPROM at start-up.
    pub magic_byte: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            offroad: 0,
            aca_flags: 4760,
            battery_current_max: 100,
            regen_current_max: 50,
            current_cal_a: 100,
            current_cal_b: 0,
            assist_level: 3,
            throttle_min: 43,
            throttle_max: 182,
            motor_specific_angle: 26,
            pas_threshold: 1.7,
            pid_gain_p: 0.5,
            pid_gain_i: 0.2,
            ramp_end: 1500,
            ramp_start: 64000,
            max_speed_default: 25,
            max_speed_without_pas: 6,
            max_speed_with_throttle_override: 25,
            wheel_circumference: 2200,
            gear_ratio: 11,
            magic_byte: 142,
        }
    }
}

impl ControllerConfig {
    /// Wheel circumference over gear ratio, zero if the ratio is unset.
    pub fn erps_factor(&self) -> u16 {
        self.wheel_circumference.checked_div(self.gear_ratio).unwrap_or(0)
    }

    /// Rejects values the engine cannot represent.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.gear_ratio == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "gear_ratio must be greater than 0".to_string(),
            });
        }
        for (name, value) in [
            ("pas_threshold", self.pas_threshold),
            ("pid_gain_p", self.pid_gain_p),
            ("pid_gain_i", self.pid_gain_i),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidConfig {
                    reason: format!("{} must be a non-negative number", name),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.max_speed_default, 25);
        assert_eq!(config.max_speed_without_pas, 6);
        assert_eq!(config.throttle_min, 43);
        assert_eq!(config.throttle_max, 182);
        assert_eq!(config.magic_byte, 142);
        assert_eq!(config.erps_factor(), 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(1.7, PAS_THRESHOLD_SCALE), 7);
        assert_eq!(quantize(0.5, PID_GAIN_SCALE), 1);
        assert_eq!(quantize(0.2, PID_GAIN_SCALE), 0);
        assert_eq!(quantize(500.0, PID_GAIN_SCALE), 255);
        assert_eq!(quantize(-1.0, PID_GAIN_SCALE), 0);
        assert_eq!(dequantize(7, PAS_THRESHOLD_SCALE), 1.75);
        for raw in 0..=u8::MAX {
            assert_eq!(quantize(dequantize(raw, 4.0), 4.0), raw);
        }
    }

    #[test]
    fn test_validate() {
        let config = ControllerConfig {
            gear_ratio: 0,
            ..Default::default()
        };
        assert_eq!(config.erps_factor(), 0);
        assert!(config.validate().is_err());

        let config = ControllerConfig {
            pid_gain_i: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml() {
        let config: ControllerConfig = serde_yaml::from_str("assist_level: 5\n").unwrap();
        assert_eq!(config.assist_level, 5);
        assert_eq!(config.ramp_end, 1500);
    }
}
