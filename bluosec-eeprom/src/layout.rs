//! Storage offsets of persisted configuration fields.
//!
//! 16-bit fields occupy two slots, high byte first. The layout is shared with
//! images written by earlier builds and must stay stable.

/// Size of the EEPROM image in bytes.
pub const IMAGE_SIZE: usize = 128;

/// Value of a never-written cell.
pub const ERASED: u8 = 0xFF;

pub const MAGIC_BYTE: u16 = 0x00;
pub const ACA_FLAGS_HIGH: u16 = 0x01;
pub const ACA_FLAGS: u16 = 0x02;
pub const BATTERY_CURRENT_MAX_HIGH: u16 = 0x03;
pub const BATTERY_CURRENT_MAX: u16 = 0x04;
pub const REGEN_CURRENT_MAX: u16 = 0x05;
pub const CURRENT_CAL_A: u16 = 0x06;
pub const ASSIST_LEVEL: u16 = 0x07;
pub const THROTTLE_MIN: u16 = 0x08;
pub const THROTTLE_MAX: u16 = 0x09;
pub const MOTOR_SPECIFIC_ANGLE: u16 = 0x0A;
pub const PAS_THRESHOLD: u16 = 0x0B;
pub const PID_GAIN_P: u16 = 0x0C;
pub const PID_GAIN_I: u16 = 0x0D;
pub const RAMP_END: u16 = 0x0E;
pub const RAMP_START: u16 = 0x0F;
pub const MAX_SPEED_DEFAULT: u16 = 0x10;
pub const MAX_SPEED_WITHOUT_PAS: u16 = 0x11;
pub const MAX_SPEED_WITH_THROTTLE_OVERRIDE: u16 = 0x12;

/// First offset past the configuration block.
pub const CONFIG_END: u16 = 0x13;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_fits_image() {
        assert!((CONFIG_END as usize) <= IMAGE_SIZE);
        assert_eq!(ACA_FLAGS, ACA_FLAGS_HIGH + 1);
        assert_eq!(BATTERY_CURRENT_MAX, BATTERY_CURRENT_MAX_HIGH + 1);
    }
}
