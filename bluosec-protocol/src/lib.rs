//! # bluosec-protocol
//!
//! Wire protocol for the BluOsec display link.
//!
//! This crate provides:
//! - ASCII-hex framing with LRC validation
//! - Address, function and payload code tables
//! - Request and response types for both ends of the link
//! - A streaming response decoder for requesters

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use error::ProtocolError;
pub use frame::{
    compute_checksum, decode_hex_char, encode_frame, encode_nibble, lrc, DecodedFrame, RawRequest,
    DECODED_FRAME_LEN, REQUEST_FRAME_LEN, START_DELIMITER, TERMINATOR,
};
pub use message::{
    Address, Code, Function, Payload, PayloadPair, Request, Response, ResponseFrame,
    MAX_PAYLOAD_PAIRS, MAX_RESPONSE_BYTES, MAX_RESPONSE_FRAME_LEN, MAX_RESPONSE_PAIRS,
};

/// Default TCP port of the serial bridge.
pub const DEFAULT_PORT: u16 = 7402;
