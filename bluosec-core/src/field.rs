//! Writable configuration fields.
//!
//! Each field ties a payload code to a mirror entry, an optional EEPROM
//! slot and its wire representation. Persisted bytes are the same bytes
//! that travel on the wire, so loading from EEPROM replays [`ConfigField::apply`].

use crate::config::{
    dequantize, quantize, ControllerConfig, PAS_THRESHOLD_SCALE, PID_GAIN_SCALE, RAMP_END_SHIFT,
    RAMP_START_SHIFT,
};
use crate::error::CoreError;
use bluosec_eeprom::layout;
use bluosec_protocol::{Code, PayloadPair};
use std::fmt;
use std::str::FromStr;

/// Where a field lives in EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Byte(u16),
    /// High byte at `high`, low byte at `low`.
    Wide { high: u16, low: u16 },
}

/// Acknowledgment pairs for one write, high pair first.
pub type AckPairs = heapless::Vec<PayloadPair, 2>;

/// Closed set of fields accepted by configuration writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Offroad,
    AcaFlags,
    MaxBatteryCurrent,
    MaxRegenCurrent,
    CurrentCalA,
    AssistLevel,
    ThrottleMinRange,
    ThrottleMaxRange,
    MotorSpecificAngle,
    PasThreshold,
    PidGainP,
    PidGainI,
    RampEnd,
    RampStart,
    MaxSpeedDefault,
    MaxSpeedWithoutPas,
    MaxSpeedWithThrottleOverride,
}

impl ConfigField {
    pub const ALL: [ConfigField; 17] = [
        ConfigField::Offroad,
        ConfigField::AcaFlags,
        ConfigField::MaxBatteryCurrent,
        ConfigField::MaxRegenCurrent,
        ConfigField::CurrentCalA,
        ConfigField::AssistLevel,
        ConfigField::ThrottleMinRange,
        ConfigField::ThrottleMaxRange,
        ConfigField::MotorSpecificAngle,
        ConfigField::PasThreshold,
        ConfigField::PidGainP,
        ConfigField::PidGainI,
        ConfigField::RampEnd,
        ConfigField::RampStart,
        ConfigField::MaxSpeedDefault,
        ConfigField::MaxSpeedWithoutPas,
        ConfigField::MaxSpeedWithThrottleOverride,
    ];

    /// Field addressed by a request code. High-byte codes are not writable
    /// on their own and map to `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        let code = Code::try_from(code).ok()?;
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    /// Code carried by write requests and by the low ack pair.
    pub fn code(self) -> Code {
        match self {
            ConfigField::Offroad => Code::Offroad,
            ConfigField::AcaFlags => Code::AcaFlags,
            ConfigField::MaxBatteryCurrent => Code::MaxBatCurrent,
            ConfigField::MaxRegenCurrent => Code::MaxRegenCurrent,
            ConfigField::CurrentCalA => Code::CurrentCalA,
            ConfigField::AssistLevel => Code::AssistLevel,
            ConfigField::ThrottleMinRange => Code::ThrottleMinRange,
            ConfigField::ThrottleMaxRange => Code::ThrottleMaxRange,
            ConfigField::MotorSpecificAngle => Code::MotorSpecificAngle,
            ConfigField::PasThreshold => Code::PasThreshold,
            ConfigField::PidGainP => Code::PidGainP,
            ConfigField::PidGainI => Code::PidGainI,
            ConfigField::RampEnd => Code::RampEnd,
            ConfigField::RampStart => Code::RampStart,
            ConfigField::MaxSpeedDefault => Code::MaxSpeedDefault,
            ConfigField::MaxSpeedWithoutPas => Code::MaxSpeedWithoutPas,
            ConfigField::MaxSpeedWithThrottleOverride => Code::MaxSpeedWithThrottleOverride,
        }
    }

    /// Companion code for the high pair of 16-bit fields.
    pub fn high_byte_code(self) -> Option<Code> {
        match self {
            ConfigField::AcaFlags => Some(Code::AcaFlagsHighByte),
            ConfigField::MaxBatteryCurrent => Some(Code::MaxBatCurrentHighByte),
            _ => None,
        }
    }

    pub fn slot(self) -> Option<Slot> {
        match self {
            ConfigField::Offroad => None,
            ConfigField::AcaFlags => Some(Slot::Wide {
                high: layout::ACA_FLAGS_HIGH,
                low: layout::ACA_FLAGS,
            }),
            ConfigField::MaxBatteryCurrent => Some(Slot::Wide {
                high: layout::BATTERY_CURRENT_MAX_HIGH,
                low: layout::BATTERY_CURRENT_MAX,
            }),
            ConfigField::MaxRegenCurrent => Some(Slot::Byte(layout::REGEN_CURRENT_MAX)),
            ConfigField::CurrentCalA => Some(Slot::Byte(layout::CURRENT_CAL_A)),
            ConfigField::AssistLevel => Some(Slot::Byte(layout::ASSIST_LEVEL)),
            ConfigField::ThrottleMinRange => Some(Slot::Byte(layout::THROTTLE_MIN)),
            ConfigField::ThrottleMaxRange => Some(Slot::Byte(layout::THROTTLE_MAX)),
            ConfigField::MotorSpecificAngle => Some(Slot::Byte(layout::MOTOR_SPECIFIC_ANGLE)),
            ConfigField::PasThreshold => Some(Slot::Byte(layout::PAS_THRESHOLD)),
            ConfigField::PidGainP => Some(Slot::Byte(layout::PID_GAIN_P)),
            ConfigField::PidGainI => Some(Slot::Byte(layout::PID_GAIN_I)),
            ConfigField::RampEnd => Some(Slot::Byte(layout::RAMP_END)),
            ConfigField::RampStart => Some(Slot::Byte(layout::RAMP_START)),
            ConfigField::MaxSpeedDefault => Some(Slot::Byte(layout::MAX_SPEED_DEFAULT)),
            ConfigField::MaxSpeedWithoutPas => Some(Slot::Byte(layout::MAX_SPEED_WITHOUT_PAS)),
            ConfigField::MaxSpeedWithThrottleOverride => {
                Some(Slot::Byte(layout::MAX_SPEED_WITH_THROTTLE_OVERRIDE))
            }
        }
    }

    /// Whether a write must raise the speed-limit-changed signal.
    pub fn changes_speed_limit(self) -> bool {
        matches!(
            self,
            ConfigField::MaxSpeedDefault
                | ConfigField::MaxSpeedWithoutPas
                | ConfigField::MaxSpeedWithThrottleOverride
        )
    }

    /// Decodes raw request bytes into the mirror.
    pub fn apply(self, config: &mut ControllerConfig, value_high: u8, value: u8) {
        let wide = u16::from_be_bytes([value_high, value]);
        match self {
            ConfigField::Offroad => config.offroad = value,
            ConfigField::AcaFlags => config.aca_flags = wide,
            ConfigField::MaxBatteryCurrent => config.battery_current_max = wide,
            ConfigField::MaxRegenCurrent => config.regen_current_max = value as u16,
            ConfigField::CurrentCalA => config.current_cal_a = value,
            ConfigField::AssistLevel => config.assist_level = value,
            ConfigField::ThrottleMinRange => config.throttle_min = value,
            ConfigField::ThrottleMaxRange => config.throttle_max = value,
            ConfigField::MotorSpecificAngle => config.motor_specific_angle = value,
            ConfigField::PasThreshold => {
                config.pas_threshold = dequantize(value, PAS_THRESHOLD_SCALE)
            }
            ConfigField::PidGainP => config.pid_gain_p = dequantize(value, PID_GAIN_SCALE),
            ConfigField::PidGainI => config.pid_gain_i = dequantize(value, PID_GAIN_SCALE),
            ConfigField::RampEnd => config.ramp_end = (value as u16) << RAMP_END_SHIFT,
            ConfigField::RampStart => config.ramp_start = (value as u16) << RAMP_START_SHIFT,
            ConfigField::MaxSpeedDefault => config.max_speed_default = value,
            ConfigField::MaxSpeedWithoutPas => config.max_speed_without_pas = value,
            ConfigField::MaxSpeedWithThrottleOverride => {
                config.max_speed_with_throttle_override = value
            }
        }
    }

    /// Current value in wire form. Single-byte fields only use the low byte.
    pub fn wire_value(self, config: &ControllerConfig) -> u16 {
        match self {
            ConfigField::Offroad => config.offroad as u16,
            ConfigField::AcaFlags => config.aca_flags,
            ConfigField::MaxBatteryCurrent => config.battery_current_max,
            ConfigField::MaxRegenCurrent => config.regen_current_max & 0xFF,
            ConfigField::CurrentCalA => config.current_cal_a as u16,
            ConfigField::AssistLevel => config.assist_level as u16,
            ConfigField::ThrottleMinRange => config.throttle_min as u16,
            ConfigField::ThrottleMaxRange => config.throttle_max as u16,
            ConfigField::MotorSpecificAngle => config.motor_specific_angle as u16,
            ConfigField::PasThreshold => quantize(config.pas_threshold, PAS_THRESHOLD_SCALE) as u16,
            ConfigField::PidGainP => quantize(config.pid_gain_p, PID_GAIN_SCALE) as u16,
            ConfigField::PidGainI => quantize(config.pid_gain_i, PID_GAIN_SCALE) as u16,
            ConfigField::RampEnd => (config.ramp_end >> RAMP_END_SHIFT) & 0xFF,
            ConfigField::RampStart => (config.ramp_start >> RAMP_START_SHIFT) & 0xFF,
            ConfigField::MaxSpeedDefault => config.max_speed_default as u16,
            ConfigField::MaxSpeedWithoutPas => config.max_speed_without_pas as u16,
            ConfigField::MaxSpeedWithThrottleOverride => {
                config.max_speed_with_throttle_override as u16
            }
        }
    }

    /// Pairs acknowledging the field's current value.
    pub fn ack_pairs(self, config: &ControllerConfig) -> AckPairs {
        let value = self.wire_value(config);
        let mut pairs = AckPairs::new();
        // At most two pushes into a two-slot vec.
        if let Some(high) = self.high_byte_code() {
            let _ = pairs.push(PayloadPair::new(high, (value >> 8) as u8));
        }
        let _ = pairs.push(PayloadPair::new(self.code(), value as u8));
        pairs
    }

    /// Name used by configuration files and tooling.
    pub fn name(self) -> &'static str {
        self.code().name()
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| CoreError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_code() {
        for field in ConfigField::ALL {
            assert_eq!(ConfigField::from_code(field.code().as_u8()), Some(field));
        }
        assert_eq!(ConfigField::from_code(Code::AcaFlagsHighByte.as_u8()), None);
        assert_eq!(ConfigField::from_code(Code::Speed.as_u8()), None);
        assert_eq!(ConfigField::from_code(0x00), None);
    }

    #[test]
    fn test_slots_unique_and_in_config_block() {
        let mut offsets = Vec::new();
        for field in ConfigField::ALL {
            match field.slot() {
                Some(Slot::Byte(o)) => offsets.push(o),
                Some(Slot::Wide { high, low }) => {
                    assert_eq!(low, high + 1);
                    offsets.push(high);
                    offsets.push(low);
                }
                None => assert_eq!(field, ConfigField::Offroad),
            }
        }
        let count = offsets.len();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), count);
        assert!(offsets.iter().all(|&o| o > layout::MAGIC_BYTE && o < layout::CONFIG_END));
    }

    #[test]
    fn test_wide_fields() {
        let mut config = ControllerConfig::default();
        ConfigField::AcaFlags.apply(&mut config, 0x12, 0x98);
        assert_eq!(config.aca_flags, 0x1298);

        let ack = ConfigField::AcaFlags.ack_pairs(&config);
        assert_eq!(
            ack.as_slice(),
            &[
                PayloadPair::new(Code::AcaFlagsHighByte, 0x12),
                PayloadPair::new(Code::AcaFlags, 0x98),
            ]
        );
    }

    #[test]
    fn test_regen_ignores_high_byte() {
        let mut config = ControllerConfig::default();
        ConfigField::MaxRegenCurrent.apply(&mut config, 0x01, 0x20);
        assert_eq!(config.regen_current_max, 0x20);
        assert_eq!(ConfigField::MaxRegenCurrent.ack_pairs(&config).len(), 1);
    }

    #[test]
    fn test_ramp_shifts() {
        let mut config = ControllerConfig::default();
        ConfigField::RampEnd.apply(&mut config, 0, 46);
        assert_eq!(config.ramp_end, 46 << 5);
        ConfigField::RampStart.apply(&mut config, 0, 200);
        assert_eq!(config.ramp_start, 200 << 6);
        assert_eq!(ConfigField::RampStart.wire_value(&config), 200);

        // Factory ramp start does not fit the wire byte.
        let config = ControllerConfig::default();
        assert_eq!(ConfigField::RampStart.wire_value(&config), (64000u16 >> 6) & 0xFF);
    }

    #[test]
    fn test_speed_limit_fields() {
        let raising: Vec<_> = ConfigField::ALL
            .into_iter()
            .filter(|f| f.changes_speed_limit())
            .collect();
        assert_eq!(
            raising,
            vec![
                ConfigField::MaxSpeedDefault,
                ConfigField::MaxSpeedWithoutPas,
                ConfigField::MaxSpeedWithThrottleOverride,
            ]
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "max_speed_default".parse::<ConfigField>().unwrap(),
            ConfigField::MaxSpeedDefault
        );
        assert_eq!(
            "PID-GAIN-P".parse::<ConfigField>().unwrap(),
            ConfigField::PidGainP
        );
        assert!("turbo".parse::<ConfigField>().is_err());
        for field in ConfigField::ALL {
            assert_eq!(field.to_string().parse::<ConfigField>().unwrap(), field);
        }
    }

    proptest! {
        #[test]
        fn prop_apply_then_wire_value(index in 0usize..17, high in any::<u8>(), low in any::<u8>()) {
            let field = ConfigField::ALL[index];
            let mut config = ControllerConfig::default();
            field.apply(&mut config, high, low);

            let expected = if field.high_byte_code().is_some() {
                u16::from_be_bytes([high, low])
            } else {
                low as u16
            };
            prop_assert_eq!(field.wire_value(&config), expected);
        }
    }
}
