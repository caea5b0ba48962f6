//! Payload builders.
//!
//! Every builder returns a fixed-size array in wire order. Sizes are
//! checked against [`MAX_PAYLOAD_PAIRS`] at compile time, leaving the one
//! extra response slot for the checksum echo.
//!
//! 16-bit and wider quantities take two pairs: the high-byte code carrying
//! `q >> 8`, then the field code carrying the low 8 bits. Single-pair slots
//! truncate.

use crate::config::{
    quantize, ControllerConfig, PAS_THRESHOLD_SCALE, PID_GAIN_SCALE, RAMP_END_SHIFT,
    RAMP_START_SHIFT,
};
use crate::telemetry::Telemetry;
use bluosec_protocol::{Code, PayloadPair, MAX_PAYLOAD_PAIRS};

/// Basic telemetry: 15 pairs, 7 spare.
pub const BASIC_PAIRS: usize = 15;

/// Detailed telemetry: 17 pairs, 5 spare.
pub const DETAIL_PAIRS: usize = 17;

/// Hall telemetry: 12 pairs, 10 spare.
pub const HALL_PAIRS: usize = 12;

/// Configuration snapshot: 22 pairs, no spare.
pub const CONFIG_PAIRS: usize = 22;

const _: () = assert!(BASIC_PAIRS <= MAX_PAYLOAD_PAIRS);
const _: () = assert!(DETAIL_PAIRS <= MAX_PAYLOAD_PAIRS);
const _: () = assert!(HALL_PAIRS <= MAX_PAYLOAD_PAIRS);
const _: () = assert!(CONFIG_PAIRS <= MAX_PAYLOAD_PAIRS);

fn pair(code: Code, value: u8) -> PayloadPair {
    PayloadPair::new(code, value)
}

fn high(code: Code, value: u32) -> PayloadPair {
    PayloadPair::new(code, (value >> 8) as u8)
}

fn low(code: Code, value: u32) -> PayloadPair {
    PayloadPair::new(code, value as u8)
}

pub fn basic(telemetry: &Telemetry, config: &ControllerConfig) -> [PayloadPair; BASIC_PAIRS] {
    let t = telemetry;
    [
        pair(Code::ActualMaxSpeed, t.actual_max_speed),
        pair(Code::AssistLevel, config.assist_level),
        pair(Code::BrakeStatus, t.brake as u8),
        pair(Code::MotorState, t.motor_state),
        pair(Code::BatteryVoltage, t.battery_voltage),
        high(Code::ErSpeedHighByte, t.er_speed.into()),
        low(Code::ErSpeed, t.er_speed.into()),
        high(Code::SpeedHighByte, t.speed),
        low(Code::Speed, t.speed),
        high(Code::BatteryCurrentHighByte, t.battery_current.into()),
        low(Code::BatteryCurrent, t.battery_current.into()),
        low(Code::SumTorque, t.sum_torque.into()),
        low(Code::Setpoint, t.setpoint.into()),
        pair(Code::SetpointState, t.setpoint_state),
        pair(Code::Uptime, t.uptime),
    ]
}

pub fn detail(telemetry: &Telemetry, config: &ControllerConfig) -> [PayloadPair; DETAIL_PAIRS] {
    let t = telemetry;
    [
        pair(Code::Offroad, config.offroad),
        pair(Code::PasActive, t.pas_active),
        pair(Code::PasDir, t.pas_dir),
        pair(Code::CorrectionValue, t.correction_value),
        low(Code::PhaseCurrent, (t.iq_current >> 2).into()),
        high(Code::ThrottleHighByte, t.throttle.into()),
        low(Code::Throttle, t.throttle.into()),
        high(Code::CurrentTargetHighByte, t.current_target),
        low(Code::CurrentTarget, t.current_target),
        high(Code::CurrentRampHighByte, t.current_ramp.into()),
        low(Code::CurrentRamp, t.current_ramp.into()),
        high(Code::PasHighCounterHighByte, t.pas_high_counter.into()),
        low(Code::PasHighCounter, t.pas_high_counter.into()),
        high(Code::PasCounterHighByte, t.pas_counter.into()),
        low(Code::PasCounter, t.pas_counter.into()),
        high(Code::VerSpeedHighByte, t.virtual_er_speed.into()),
        low(Code::VerSpeed, t.virtual_er_speed.into()),
    ]
}

pub fn hall(telemetry: &Telemetry) -> [PayloadPair; HALL_PAIRS] {
    let currents = &telemetry.hall_currents;
    let order = &telemetry.hall_order;
    [
        pair(Code::CurrentAtHallPosition0, currents[0]),
        pair(Code::CurrentAtHallPosition1, currents[1]),
        pair(Code::CurrentAtHallPosition2, currents[2]),
        pair(Code::CurrentAtHallPosition3, currents[3]),
        pair(Code::CurrentAtHallPosition4, currents[4]),
        pair(Code::CurrentAtHallPosition5, currents[5]),
        pair(Code::HallOrder0, order[0]),
        pair(Code::HallOrder1, order[1]),
        pair(Code::HallOrder2, order[2]),
        pair(Code::HallOrder3, order[3]),
        pair(Code::HallOrder4, order[4]),
        pair(Code::HallOrder5, order[5]),
    ]
}

/// Snapshot of the configuration mirror.
pub fn config(config: &ControllerConfig) -> [PayloadPair; CONFIG_PAIRS] {
    let c = config;
    [
        low(Code::ErpsFactor, c.erps_factor().into()),
        pair(Code::CurrentCalA, c.current_cal_a),
        high(Code::CurrentCalBHighByte, c.current_cal_b.into()),
        low(Code::CurrentCalB, c.current_cal_b.into()),
        pair(Code::EepromMagicByte, c.magic_byte),
        pair(Code::MaxSpeedDefault, c.max_speed_default),
        pair(Code::MaxSpeedWithoutPas, c.max_speed_without_pas),
        pair(
            Code::MaxSpeedWithThrottleOverride,
            c.max_speed_with_throttle_override,
        ),
        high(Code::AcaFlagsHighByte, c.aca_flags.into()),
        low(Code::AcaFlags, c.aca_flags.into()),
        pair(Code::AssistLevel, c.assist_level),
        pair(Code::ThrottleMinRange, c.throttle_min),
        pair(Code::ThrottleMaxRange, c.throttle_max),
        pair(Code::MotorSpecificAngle, c.motor_specific_angle),
        pair(
            Code::PasThreshold,
            quantize(c.pas_threshold, PAS_THRESHOLD_SCALE),
        ),
        pair(Code::PidGainP, quantize(c.pid_gain_p, PID_GAIN_SCALE)),
        pair(Code::PidGainI, quantize(c.pid_gain_i, PID_GAIN_SCALE)),
        low(Code::RampEnd, (c.ramp_end >> RAMP_END_SHIFT).into()),
        low(Code::RampStart, (c.ramp_start >> RAMP_START_SHIFT).into()),
        high(Code::MaxBatCurrentHighByte, c.battery_current_max.into()),
        low(Code::MaxBatCurrent, c.battery_current_max.into()),
        low(Code::MaxRegenCurrent, c.regen_current_max.into()),
    ]
}
