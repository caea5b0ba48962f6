//! Protocol constants and the request/response types built from them.
//!
//! Address, function and code values are part of the wire contract shared
//! with display firmware and must not be renumbered.

use crate::error::ProtocolError;
use crate::frame::{self, DecodedFrame, RawRequest};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of data pairs a builder may add to one response.
pub const MAX_PAYLOAD_PAIRS: usize = 22;

/// Pairs in a response: data pairs plus the trailing checksum echo.
pub const MAX_RESPONSE_PAIRS: usize = MAX_PAYLOAD_PAIRS + 1;

/// Decoded response size bound: header, pairs and the response LRC.
pub const MAX_RESPONSE_BYTES: usize = 2 + MAX_RESPONSE_PAIRS * 2 + 1;

/// Raw response size bound on the wire.
pub const MAX_RESPONSE_FRAME_LEN: usize = frame::encoded_len(MAX_RESPONSE_BYTES);

/// Target domain of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Address {
    /// Live telemetry.
    DynamicData = 0x10,
    /// Configuration snapshot.
    StaticData = 0x20,
    /// Configuration write, in memory only.
    Config = 0x30,
    /// Configuration write, persisted to EEPROM.
    Eeprom = 0x40,
    /// Error echo responses.
    Error = 0xEE,
}

impl Address {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether writes to this address reach persistent storage.
    pub fn persists(self) -> bool {
        self == Address::Eeprom
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Address::DynamicData => "dynamic_data",
            Address::StaticData => "static_data",
            Address::Config => "config",
            Address::Eeprom => "eeprom",
            Address::Error => "error",
        }
    }
}

impl TryFrom<u8> for Address {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x10 => Ok(Address::DynamicData),
            0x20 => Ok(Address::StaticData),
            0x30 => Ok(Address::Config),
            0x40 => Ok(Address::Eeprom),
            0xEE => Ok(Address::Error),
            other => Err(ProtocolError::UnknownAddress(other)),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Function {
    /// Basic telemetry (dynamic data address).
    BasicInfos = 0x01,
    /// Detailed telemetry (dynamic data address).
    DetailInfos = 0x02,
    /// Hall sensor telemetry (dynamic data address).
    HallInfos = 0x03,
    /// Configuration snapshot (static data address).
    ConfigInfos = 0x04,
}

impl Function {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Function {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(Function::BasicInfos),
            0x02 => Ok(Function::DetailInfos),
            0x03 => Ok(Function::HallInfos),
            0x04 => Ok(Function::ConfigInfos),
            other => Err(ProtocolError::UnknownFunction(other)),
        }
    }
}

macro_rules! codes {
    ($($(#[$doc:meta])* $name:ident = $value:literal => $label:literal,)+) => {
        /// Payload codes, one per telemetry or configuration field.
        ///
        /// Fields wider than a byte have a companion `*HighByte` code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        #[repr(u8)]
        pub enum Code {
            $($(#[$doc])* $name = $value,)+
        }

        impl Code {
            /// Every code, in ascending order.
            pub const ALL: &'static [Code] = &[$(Code::$name,)+];

            /// Short field name used by tooling.
            pub fn name(self) -> &'static str {
                match self {
                    $(Code::$name => $label,)+
                }
            }
        }

        impl TryFrom<u8> for Code {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, ProtocolError> {
                match value {
                    $($value => Ok(Code::$name),)+
                    other => Err(ProtocolError::UnknownCode(other)),
                }
            }
        }
    };
}

codes! {
    // Basic telemetry
    ActualMaxSpeed = 0x01 => "actual_max_speed",
    AssistLevel = 0x02 => "assist_level",
    BrakeStatus = 0x03 => "brake_status",
    MotorState = 0x04 => "motor_state",
    BatteryVoltage = 0x05 => "battery_voltage",
    ErSpeedHighByte = 0x06 => "er_speed_high",
    ErSpeed = 0x07 => "er_speed",
    SpeedHighByte = 0x08 => "speed_high",
    Speed = 0x09 => "speed",
    BatteryCurrentHighByte = 0x0A => "battery_current_high",
    BatteryCurrent = 0x0B => "battery_current",
    SumTorque = 0x0C => "sum_torque",
    Setpoint = 0x0D => "setpoint",
    SetpointState = 0x0E => "setpoint_state",
    Uptime = 0x0F => "uptime",

    // Detailed telemetry
    Offroad = 0x20 => "offroad",
    PasActive = 0x21 => "pas_active",
    PasDir = 0x22 => "pas_dir",
    CorrectionValue = 0x23 => "correction_value",
    PhaseCurrent = 0x24 => "phase_current",
    ThrottleHighByte = 0x25 => "throttle_high",
    Throttle = 0x26 => "throttle",
    CurrentTargetHighByte = 0x27 => "current_target_high",
    CurrentTarget = 0x28 => "current_target",
    CurrentRampHighByte = 0x29 => "current_ramp_high",
    CurrentRamp = 0x2A => "current_ramp",
    PasHighCounterHighByte = 0x2B => "pas_high_counter_high",
    PasHighCounter = 0x2C => "pas_high_counter",
    PasCounterHighByte = 0x2D => "pas_counter_high",
    PasCounter = 0x2E => "pas_counter",
    VerSpeedHighByte = 0x2F => "ver_speed_high",
    VerSpeed = 0x30 => "ver_speed",

    // Hall sensor telemetry
    CurrentAtHallPosition0 = 0x40 => "current_at_hall_0",
    CurrentAtHallPosition1 = 0x41 => "current_at_hall_1",
    CurrentAtHallPosition2 = 0x42 => "current_at_hall_2",
    CurrentAtHallPosition3 = 0x43 => "current_at_hall_3",
    CurrentAtHallPosition4 = 0x44 => "current_at_hall_4",
    CurrentAtHallPosition5 = 0x45 => "current_at_hall_5",
    HallOrder0 = 0x48 => "hall_order_0",
    HallOrder1 = 0x49 => "hall_order_1",
    HallOrder2 = 0x4A => "hall_order_2",
    HallOrder3 = 0x4B => "hall_order_3",
    HallOrder4 = 0x4C => "hall_order_4",
    HallOrder5 = 0x4D => "hall_order_5",

    // Configuration
    ErpsFactor = 0x60 => "erps_factor",
    CurrentCalA = 0x61 => "current_cal_a",
    CurrentCalBHighByte = 0x62 => "current_cal_b_high",
    CurrentCalB = 0x63 => "current_cal_b",
    EepromMagicByte = 0x64 => "eeprom_magic_byte",
    MaxSpeedDefault = 0x65 => "max_speed_default",
    MaxSpeedWithoutPas = 0x66 => "max_speed_without_pas",
    MaxSpeedWithThrottleOverride = 0x67 => "max_speed_with_throttle_override",
    AcaFlagsHighByte = 0x68 => "aca_flags_high",
    AcaFlags = 0x69 => "aca_flags",
    ThrottleMinRange = 0x6A => "throttle_min_range",
    ThrottleMaxRange = 0x6B => "throttle_max_range",
    MotorSpecificAngle = 0x6C => "motor_specific_angle",
    PasThreshold = 0x6D => "pas_threshold",
    PidGainP = 0x6E => "pid_gain_p",
    PidGainI = 0x6F => "pid_gain_i",
    RampEnd = 0x70 => "ramp_end",
    RampStart = 0x71 => "ramp_start",
    MaxBatCurrentHighByte = 0x72 => "max_bat_current_high",
    MaxBatCurrent = 0x73 => "max_bat_current",
    MaxRegenCurrent = 0x74 => "max_regen_current",

    /// Echo of the request LRC, last pair of every response.
    LrcCheck = 0xE0 => "lrc_check",
    /// Unknown function or code; first of the error echo codes.
    Error = 0xF0 => "error",
}

impl Code {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Codes at or above this value are reserved for error echoes.
    pub const ERROR_ECHO_BASE: u8 = Code::Error as u8;

    /// Whether a raw code belongs to the error echo range.
    pub fn is_error_echo(code: u8) -> bool {
        code >= Self::ERROR_ECHO_BASE
    }

    /// Code tagging byte `index` of an echoed request.
    pub fn error_echo(index: u8) -> u8 {
        Self::ERROR_ECHO_BASE.wrapping_add(index)
    }

}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One `(code, value)` unit of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadPair {
    pub code: u8,
    pub value: u8,
}

impl PayloadPair {
    pub fn new(code: Code, value: u8) -> Self {
        Self {
            code: code.as_u8(),
            value,
        }
    }

    pub fn raw(code: u8, value: u8) -> Self {
        Self { code, value }
    }

    /// High and low pairs of a 16-bit quantity.
    pub fn wide(high: Code, low: Code, value: u16) -> [Self; 2] {
        [
            Self::new(high, (value >> 8) as u8),
            Self::new(low, value as u8),
        ]
    }

    /// The single `(ERROR, ERROR)` pair for unknown functions and codes.
    pub fn error() -> Self {
        Self::new(Code::Error, Code::Error.as_u8())
    }

    /// Named code, if this pair carries one.
    pub fn known_code(&self) -> Option<Code> {
        Code::try_from(self.code).ok()
    }
}

/// Ordered response body, bounded by the send buffer.
pub type Payload = heapless::Vec<PayloadPair, MAX_RESPONSE_PAIRS>;

/// A response under construction or ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub address: u8,
    pub function: u8,
    pub payload: Payload,
}

impl Response {
    /// Starts a response with its two header bytes.
    pub fn new(address: u8, function: u8) -> Self {
        Self {
            address,
            function,
            payload: Payload::new(),
        }
    }

    /// Appends one pair.
    pub fn push(&mut self, pair: PayloadPair) -> Result<(), ProtocolError> {
        self.payload.push(pair).map_err(|_| ProtocolError::PayloadFull {
            capacity: MAX_RESPONSE_PAIRS,
        })
    }

    /// Appends pairs in order.
    pub fn extend(&mut self, pairs: &[PayloadPair]) -> Result<(), ProtocolError> {
        self.payload
            .extend_from_slice(pairs)
            .map_err(|_| ProtocolError::PayloadFull {
                capacity: MAX_RESPONSE_PAIRS,
            })
    }

    /// Header and pairs, without the response LRC.
    pub fn body(&self) -> heapless::Vec<u8, MAX_RESPONSE_BYTES> {
        let mut bytes = heapless::Vec::new();
        // 2 + 2 * MAX_RESPONSE_PAIRS < MAX_RESPONSE_BYTES, pushes cannot fail.
        let _ = bytes.push(self.address);
        let _ = bytes.push(self.function);
        for pair in &self.payload {
            let _ = bytes.push(pair.code);
            let _ = bytes.push(pair.value);
        }
        bytes
    }

    /// LRC over the header and pairs.
    pub fn checksum(&self) -> u8 {
        frame::lrc(&self.body())
    }

    /// Header, pairs and the trailing LRC.
    pub fn signed_bytes(&self) -> heapless::Vec<u8, MAX_RESPONSE_BYTES> {
        let mut bytes = self.body();
        let checksum = frame::lrc(&bytes);
        let _ = bytes.push(checksum);
        bytes
    }

    /// The complete raw frame.
    pub fn encode(&self) -> BytesMut {
        let signed = self.signed_bytes();
        let mut buf = BytesMut::with_capacity(frame::encoded_len(signed.len()));
        frame::encode_frame(&signed, &mut buf);
        buf
    }
}

/// A request as built by the display side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub address: u8,
    pub function: u8,
    pub code: u8,
    pub value: u16,
}

impl Request {
    pub fn new(address: Address, function: u8) -> Self {
        Self {
            address: address.as_u8(),
            function,
            code: 0,
            value: 0,
        }
    }

    /// Telemetry or snapshot read.
    pub fn read(address: Address, function: Function) -> Self {
        Self::new(address, function.as_u8())
    }

    /// Configuration write. `persist` selects the EEPROM address.
    pub fn write(code: Code, value: u16, persist: bool) -> Self {
        let address = if persist {
            Address::Eeprom
        } else {
            Address::Config
        };
        Self::new(address, 0).with_field(code.as_u8(), value)
    }

    pub fn with_field(mut self, code: u8, value: u16) -> Self {
        self.code = code;
        self.value = value;
        self
    }

    pub fn to_decoded(&self) -> DecodedFrame {
        DecodedFrame::new(
            self.address,
            self.function,
            (self.value >> 8) as u8,
            self.code,
            self.value as u8,
        )
    }

    pub fn encode(&self) -> RawRequest {
        self.to_decoded().encode()
    }
}

/// A response parsed and verified by the display side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub address: u8,
    pub function: u8,
    pub pairs: Vec<PayloadPair>,
    pub checksum: u8,
}

impl ResponseFrame {
    /// Parses a complete raw response frame.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: heapless::Vec<u8, MAX_RESPONSE_BYTES> = frame::decode_frame_strict(raw)?;
        // address + function + checksum
        if bytes.len() < 3 || bytes.len() % 2 == 0 {
            return Err(ProtocolError::FrameTooShort {
                size: bytes.len(),
                min: 3,
            });
        }
        let checksum = bytes[bytes.len() - 1];
        let pairs = bytes[2..bytes.len() - 1]
            .chunks_exact(2)
            .map(|p| PayloadPair::raw(p[0], p[1]))
            .collect();
        Ok(Self {
            address: bytes[0],
            function: bytes[1],
            pairs,
            checksum,
        })
    }

    pub fn address(&self) -> Option<Address> {
        Address::try_from(self.address).ok()
    }

    /// Whether this is a checksum error echo.
    pub fn is_error_echo(&self) -> bool {
        self.address == Address::Error.as_u8()
    }

    /// Whether the body carries the `(ERROR, ERROR)` pair.
    pub fn has_error_pair(&self) -> bool {
        self.pairs.contains(&PayloadPair::error())
    }

    /// Value of the first pair carrying `code`.
    pub fn value(&self, code: Code) -> Option<u8> {
        self.pairs
            .iter()
            .find(|p| p.code == code.as_u8())
            .map(|p| p.value)
    }

    /// 16-bit value reassembled from a high/low pair.
    pub fn wide_value(&self, high: Code, low: Code) -> Option<u16> {
        let high = self.value(high)?;
        let low = self.value(low)?;
        Some(u16::from_be_bytes([high, low]))
    }

    /// The echoed request checksum from the trailing check pair.
    pub fn lrc_check(&self) -> Option<u8> {
        self.value(Code::LrcCheck)
    }

    /// Data pairs, without the trailing check pair.
    pub fn data_pairs(&self) -> &[PayloadPair] {
        match self.pairs.last() {
            Some(last) if last.code == Code::LrcCheck.as_u8() => &self.pairs[..self.pairs.len() - 1],
            _ => &self.pairs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bounds() {
        assert_eq!(MAX_RESPONSE_BYTES, 49);
        assert_eq!(MAX_RESPONSE_FRAME_LEN, 101);
    }

    #[test]
    fn test_address_roundtrip() {
        for address in [
            Address::DynamicData,
            Address::StaticData,
            Address::Config,
            Address::Eeprom,
            Address::Error,
        ] {
            assert_eq!(Address::try_from(address.as_u8()).unwrap(), address);
        }
        assert_eq!(
            Address::try_from(0x99).unwrap_err(),
            ProtocolError::UnknownAddress(0x99)
        );
        assert!(Address::Eeprom.persists());
        assert!(!Address::Config.persists());
    }

    #[test]
    fn test_code_table_consistent() {
        for &code in Code::ALL {
            assert_eq!(Code::try_from(code.as_u8()).unwrap(), code);
        }
        let mut names: Vec<_> = Code::ALL.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Code::ALL.len());
        assert!(Code::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_error_echo_codes() {
        assert_eq!(Code::error_echo(0), Code::Error.as_u8());
        assert_eq!(Code::error_echo(6), 0xF6);
        assert!(Code::is_error_echo(0xF6));
        assert!(!Code::is_error_echo(Code::LrcCheck.as_u8()));
        for &code in Code::ALL {
            if code != Code::Error {
                assert!(!Code::is_error_echo(code.as_u8()), "{code} in error range");
            }
        }
    }

    #[test]
    fn test_wide_pairs() {
        let [high, low] = PayloadPair::wide(Code::AcaFlagsHighByte, Code::AcaFlags, 0x1298);
        assert_eq!(high, PayloadPair::new(Code::AcaFlagsHighByte, 0x12));
        assert_eq!(low, PayloadPair::new(Code::AcaFlags, 0x98));
    }

    #[test]
    fn test_response_capacity() {
        let mut response = Response::new(0x10, 0x01);
        for _ in 0..MAX_RESPONSE_PAIRS {
            response.push(PayloadPair::error()).unwrap();
        }
        assert_eq!(
            response.push(PayloadPair::error()),
            Err(ProtocolError::PayloadFull {
                capacity: MAX_RESPONSE_PAIRS
            })
        );
        assert_eq!(response.signed_bytes().len(), MAX_RESPONSE_BYTES);
        assert_eq!(response.encode().len(), MAX_RESPONSE_FRAME_LEN);
    }

    #[test]
    fn test_response_encode_parse() {
        let mut response = Response::new(Address::DynamicData.as_u8(), Function::BasicInfos.as_u8());
        response
            .extend(&PayloadPair::wide(Code::ErSpeedHighByte, Code::ErSpeed, 0x0203))
            .unwrap();
        response
            .push(PayloadPair::new(Code::LrcCheck, 0xEF))
            .unwrap();

        let raw = response.encode();
        assert_eq!(raw[0], b':');
        assert!(raw.ends_with(b"\r\n"));

        let parsed = ResponseFrame::parse(&raw).unwrap();
        assert_eq!(parsed.address(), Some(Address::DynamicData));
        assert_eq!(parsed.function, Function::BasicInfos.as_u8());
        assert_eq!(parsed.wide_value(Code::ErSpeedHighByte, Code::ErSpeed), Some(0x0203));
        assert_eq!(parsed.lrc_check(), Some(0xEF));
        assert_eq!(parsed.data_pairs().len(), 2);
        assert_eq!(parsed.checksum, response.checksum());
        assert!(!parsed.is_error_echo());
        assert!(!parsed.has_error_pair());
    }

    #[test]
    fn test_response_parse_rejects_corruption() {
        let mut response = Response::new(0x20, 0x04);
        response.push(PayloadPair::new(Code::AssistLevel, 3)).unwrap();
        let mut raw = response.encode().to_vec();
        raw[5] = if raw[5] == b'0' { b'1' } else { b'0' };
        assert!(matches!(
            ResponseFrame::parse(&raw),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_request_write() {
        let request = Request::write(Code::MaxBatCurrent, 0x0123, true);
        let decoded = request.to_decoded();
        assert_eq!(decoded.address(), Address::Eeprom.as_u8());
        assert_eq!(decoded.code(), Code::MaxBatCurrent.as_u8());
        assert_eq!(decoded.value_high(), 0x01);
        assert_eq!(decoded.value(), 0x23);
        assert!(decoded.verify());

        let volatile = Request::write(Code::Offroad, 1, false);
        assert_eq!(volatile.address, Address::Config.as_u8());
    }

    #[test]
    fn test_response_frame_json() {
        let parsed = ResponseFrame {
            address: 0x20,
            function: 0x04,
            pairs: vec![PayloadPair::new(Code::AssistLevel, 3)],
            checksum: 0,
        };
        let json = serde_json::to_string(&parsed).unwrap();
        assert!(json.contains("\"pairs\":[{\"code\":2,\"value\":3}]"));
    }
}
