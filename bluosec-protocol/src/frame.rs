//! ASCII-hex frame format.
//!
//! Request layout (17 raw bytes):
//!
//! ```text
//! +-----+---------+----------+----------+------------+------+-------+-----+-------+
//! | ':' | address | function | reserved | value_high | code | value | lrc | CR LF |
//! |  1  |    2    |    2     |    2     |     2      |  2   |   2   |  2  |   2   |
//! +-----+---------+----------+----------+------------+------+-------+-----+-------+
//! ```
//!
//! Every decoded byte travels as two ASCII hex characters, high nibble first.
//! Responses use the same delimiters around a variable number of bytes:
//! address, function, `(code, value)` pairs and a trailing LRC.

use crate::error::ProtocolError;
use bytes::BufMut;

/// Start delimiter of every frame.
pub const START_DELIMITER: u8 = b':';

/// Frame terminator.
pub const TERMINATOR: [u8; 2] = *b"\r\n";

/// Raw length of a request frame on the wire.
pub const REQUEST_FRAME_LEN: usize = 17;

/// Number of bytes a request decodes into (6 payload bytes + LRC).
pub const DECODED_FRAME_LEN: usize = 7;

/// Maps a 4-bit value to its uppercase ASCII hex digit.
///
/// Only the low nibble of `value` is considered.
pub fn encode_nibble(value: u8) -> u8 {
    let nibble = value & 0x0F;
    if nibble <= 9 {
        b'0' + nibble
    } else {
        b'A' + nibble - 10
    }
}

/// Maps an ASCII hex digit to its value. Case-insensitive.
///
/// Anything that is not a hex digit decodes to 0; a corrupted character then
/// shows up as a checksum mismatch instead of a decode error.
pub fn decode_hex_char(ch: u8) -> u8 {
    match ch {
        b'0'..=b'9' => ch - b'0',
        b'A'..=b'F' => ch - b'A' + 10,
        b'a'..=b'f' => ch - b'a' + 10,
        _ => 0,
    }
}

/// Longitudinal redundancy check: two's complement of the wrapping byte sum.
pub fn lrc(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (!sum).wrapping_add(1)
}

/// LRC over `bytes[start..end]`.
pub fn compute_checksum(bytes: &[u8], start: usize, end: usize) -> u8 {
    lrc(&bytes[start..end])
}

/// Writes `bytes` as a complete frame: delimiter, hex pairs, terminator.
pub fn encode_frame<B: BufMut>(bytes: &[u8], out: &mut B) {
    out.put_u8(START_DELIMITER);
    for &byte in bytes {
        out.put_u8(encode_nibble(byte >> 4));
        out.put_u8(encode_nibble(byte & 0x0F));
    }
    out.put_slice(&TERMINATOR);
}

/// Raw length of a frame carrying `decoded_len` bytes.
pub const fn encoded_len(decoded_len: usize) -> usize {
    1 + decoded_len * 2 + TERMINATOR.len()
}

/// Strictly parses a complete raw frame into its decoded bytes.
///
/// Unlike the controller-side [`DecodedFrame::decode`], this checks both
/// delimiters, rejects non-hex characters and verifies the trailing LRC.
/// The returned bytes still include the LRC byte.
pub fn decode_frame_strict<const N: usize>(
    raw: &[u8],
) -> Result<heapless::Vec<u8, N>, ProtocolError> {
    let first = *raw.first().ok_or(ProtocolError::FrameTooShort { size: 0, min: 5 })?;
    if first != START_DELIMITER {
        return Err(ProtocolError::MissingDelimiter(first));
    }
    if raw.len() < 3 || !raw.ends_with(&TERMINATOR) {
        return Err(ProtocolError::MissingTerminator);
    }

    let hex = &raw[1..raw.len() - TERMINATOR.len()];
    if hex.len() % 2 != 0 {
        return Err(ProtocolError::OddHexLength(hex.len()));
    }
    if hex.len() / 2 > N {
        return Err(ProtocolError::FrameTooLarge {
            size: hex.len() / 2,
            max: N,
        });
    }
    if hex.len() < 2 {
        return Err(ProtocolError::FrameTooShort {
            size: raw.len(),
            min: encoded_len(1),
        });
    }

    let mut bytes = heapless::Vec::new();
    for (i, pair) in hex.chunks_exact(2).enumerate() {
        for (j, &ch) in pair.iter().enumerate() {
            if !ch.is_ascii_hexdigit() {
                return Err(ProtocolError::InvalidHexDigit(ch, 1 + i * 2 + j));
            }
        }
        let byte = (decode_hex_char(pair[0]) << 4) | decode_hex_char(pair[1]);
        // Capacity was checked above.
        let _ = bytes.push(byte);
    }

    let (body, received) = bytes.split_at(bytes.len() - 1);
    let expected = lrc(body);
    if expected != received[0] {
        return Err(ProtocolError::ChecksumMismatch {
            expected,
            actual: received[0],
        });
    }

    Ok(bytes)
}

/// A request exactly as it arrived from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRequest(pub [u8; REQUEST_FRAME_LEN]);

impl RawRequest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the delimiter and terminator sit where a request expects them.
    ///
    /// The controller does not act on this; it is a diagnostic for
    /// misaligned windows.
    pub fn is_aligned(&self) -> bool {
        self.0[0] == START_DELIMITER && self.0[REQUEST_FRAME_LEN - 2..] == TERMINATOR
    }
}

impl From<[u8; REQUEST_FRAME_LEN]> for RawRequest {
    fn from(bytes: [u8; REQUEST_FRAME_LEN]) -> Self {
        Self(bytes)
    }
}

/// The 7 bytes carried by a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame([u8; DECODED_FRAME_LEN]);

impl DecodedFrame {
    /// Index of the LRC byte.
    pub const CHECKSUM_INDEX: usize = DECODED_FRAME_LEN - 1;

    /// Builds a frame from its six payload bytes and appends the LRC.
    pub fn new(address: u8, function: u8, value_high: u8, code: u8, value: u8) -> Self {
        let mut bytes = [address, function, 0, value_high, code, value, 0];
        bytes[Self::CHECKSUM_INDEX] = lrc(&bytes[..Self::CHECKSUM_INDEX]);
        Self(bytes)
    }

    /// Wraps already decoded bytes, checksum included, without verifying.
    pub fn from_bytes(bytes: [u8; DECODED_FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Hex-decodes a raw request, skipping the leading delimiter.
    ///
    /// Neither delimiter is checked and non-hex characters decode to zero.
    pub fn decode(raw: &RawRequest) -> Self {
        let mut bytes = [0u8; DECODED_FRAME_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let high = decode_hex_char(raw.0[1 + i * 2]);
            let low = decode_hex_char(raw.0[2 + i * 2]);
            *byte = (high << 4) | low;
        }
        Self(bytes)
    }

    /// Encodes this frame as a raw request.
    pub fn encode(&self) -> RawRequest {
        let mut raw = [0u8; REQUEST_FRAME_LEN];
        let mut out = &mut raw[..];
        encode_frame(&self.0, &mut out);
        RawRequest(raw)
    }

    /// LRC recomputed over the payload bytes.
    pub fn expected_checksum(&self) -> u8 {
        compute_checksum(&self.0, 0, Self::CHECKSUM_INDEX)
    }

    /// Whether the received LRC matches the payload.
    pub fn verify(&self) -> bool {
        self.expected_checksum() == self.checksum()
    }

    pub fn as_bytes(&self) -> &[u8; DECODED_FRAME_LEN] {
        &self.0
    }

    pub fn address(&self) -> u8 {
        self.0[0]
    }

    pub fn function(&self) -> u8 {
        self.0[1]
    }

    pub fn value_high(&self) -> u8 {
        self.0[3]
    }

    /// Low byte of the requested code.
    pub fn code(&self) -> u8 {
        self.0[4]
    }

    pub fn value(&self) -> u8 {
        self.0[5]
    }

    /// The LRC byte as received.
    pub fn checksum(&self) -> u8 {
        self.0[Self::CHECKSUM_INDEX]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_nibble() {
        assert_eq!(encode_nibble(0), b'0');
        assert_eq!(encode_nibble(9), b'9');
        assert_eq!(encode_nibble(10), b'A');
        assert_eq!(encode_nibble(15), b'F');
    }

    #[test]
    fn test_decode_hex_char() {
        assert_eq!(decode_hex_char(b'0'), 0);
        assert_eq!(decode_hex_char(b'7'), 7);
        assert_eq!(decode_hex_char(b'A'), 10);
        assert_eq!(decode_hex_char(b'f'), 15);
        // Not hex: silently zero
        assert_eq!(decode_hex_char(b'G'), 0);
        assert_eq!(decode_hex_char(b':'), 0);
        assert_eq!(decode_hex_char(0xFF), 0);
    }

    #[test]
    fn test_lrc_known_value() {
        // ":304100305F" carries 30 41 00 30 with LRC 5F
        assert_eq!(lrc(&[0x30, 0x41, 0x00, 0x30]), 0x5F);
        assert_eq!(lrc(&[]), 0);
        assert_eq!(lrc(&[0x01]), 0xFF);
    }

    #[test]
    fn test_compute_checksum_range() {
        let bytes = [0xAA, 0x01, 0x02, 0xBB];
        assert_eq!(compute_checksum(&bytes, 1, 3), lrc(&[0x01, 0x02]));
    }

    #[test]
    fn test_encode_frame() {
        let mut out = Vec::new();
        encode_frame(&[0x30, 0x41, 0x00, 0x30, 0x5F], &mut out);
        assert_eq!(out, b":304100305F\r\n");
        assert_eq!(out.len(), encoded_len(5));
    }

    #[test]
    fn test_decoded_frame_roundtrip() {
        let frame = DecodedFrame::new(0x10, 0x01, 0x12, 0x69, 0x34);
        assert!(frame.verify());

        let raw = frame.encode();
        assert!(raw.is_aligned());
        assert_eq!(raw.0[0], b':');
        assert_eq!(&raw.0[15..], b"\r\n");

        let decoded = DecodedFrame::decode(&raw);
        assert_eq!(decoded, frame);
        assert_eq!(decoded.address(), 0x10);
        assert_eq!(decoded.function(), 0x01);
        assert_eq!(decoded.value_high(), 0x12);
        assert_eq!(decoded.code(), 0x69);
        assert_eq!(decoded.value(), 0x34);
    }

    #[test]
    fn test_decode_lowercase() {
        let raw = RawRequest(*b":10010000000a00\r\n");
        let decoded = DecodedFrame::decode(&raw);
        assert_eq!(decoded.value(), 0x0A);
    }

    #[test]
    fn test_decode_ignores_delimiters() {
        let mut raw = DecodedFrame::new(0x10, 0x01, 0, 0, 0).encode();
        raw.0[0] = b'X';
        raw.0[16] = b'Y';
        assert!(!raw.is_aligned());
        assert!(DecodedFrame::decode(&raw).verify());
    }

    #[test]
    fn test_off_by_one_checksum_fails() {
        let good = DecodedFrame::new(0x10, 0x01, 0, 0, 0);
        let mut bytes = *good.as_bytes();
        bytes[6] = bytes[6].wrapping_add(1);
        let bad = DecodedFrame::from_bytes(bytes);
        assert!(!bad.verify());
        assert_eq!(bad.expected_checksum(), good.checksum());
    }

    #[test]
    fn test_decode_frame_strict() {
        let bytes: heapless::Vec<u8, 8> = decode_frame_strict(b":304100305F\r\n").unwrap();
        assert_eq!(bytes.as_slice(), &[0x30, 0x41, 0x00, 0x30, 0x5F]);
    }

    #[test]
    fn test_decode_frame_strict_errors() {
        let r: Result<heapless::Vec<u8, 8>, _> = decode_frame_strict(b"304100305F\r\n");
        assert_eq!(r.unwrap_err(), ProtocolError::MissingDelimiter(b'3'));

        let r: Result<heapless::Vec<u8, 8>, _> = decode_frame_strict(b":304100305F");
        assert_eq!(r.unwrap_err(), ProtocolError::MissingTerminator);

        let r: Result<heapless::Vec<u8, 8>, _> = decode_frame_strict(b":304100305\r\n");
        assert_eq!(r.unwrap_err(), ProtocolError::OddHexLength(9));

        let r: Result<heapless::Vec<u8, 8>, _> = decode_frame_strict(b":3041G0305F\r\n");
        assert_eq!(r.unwrap_err(), ProtocolError::InvalidHexDigit(b'G', 5));

        let r: Result<heapless::Vec<u8, 8>, _> = decode_frame_strict(b":3041003060\r\n");
        assert_eq!(
            r.unwrap_err(),
            ProtocolError::ChecksumMismatch {
                expected: 0x5F,
                actual: 0x60
            }
        );

        let r: Result<heapless::Vec<u8, 2>, _> = decode_frame_strict(b":304100305F\r\n");
        assert!(matches!(r, Err(ProtocolError::FrameTooLarge { size: 5, max: 2 })));

        let r: Result<heapless::Vec<u8, 8>, _> = decode_frame_strict(b"");
        assert!(matches!(r, Err(ProtocolError::FrameTooShort { .. })));
    }

    proptest! {
        #[test]
        fn prop_hex_roundtrip(v in any::<u8>()) {
            prop_assert_eq!(decode_hex_char(encode_nibble(v >> 4)), v >> 4);
            prop_assert_eq!(decode_hex_char(encode_nibble(v & 0x0F)), v & 0x0F);
            prop_assert_eq!(
                decode_hex_char(encode_nibble(v & 0x0F).to_ascii_lowercase()),
                v & 0x0F
            );
        }

        #[test]
        fn prop_frame_roundtrip(bytes in prop::collection::vec(any::<u8>(), 1..48)) {
            let mut signed = bytes.clone();
            signed.push(lrc(&bytes));
            let mut raw = Vec::new();
            encode_frame(&signed, &mut raw);
            let decoded: heapless::Vec<u8, 49> = decode_frame_strict(&raw).unwrap();
            prop_assert_eq!(decoded.as_slice(), signed.as_slice());
        }

        #[test]
        fn prop_request_roundtrip(
            address in any::<u8>(),
            function in any::<u8>(),
            value_high in any::<u8>(),
            code in any::<u8>(),
            value in any::<u8>(),
        ) {
            let frame = DecodedFrame::new(address, function, value_high, code, value);
            let decoded = DecodedFrame::decode(&frame.encode());
            prop_assert!(decoded.verify());
            prop_assert_eq!(decoded, frame);
        }

        #[test]
        fn prop_single_byte_corruption_detected(
            payload in prop::array::uniform6(any::<u8>()),
            index in 0usize..DECODED_FRAME_LEN,
            delta in 1u8..=255,
        ) {
            let frame = DecodedFrame::new(payload[0], payload[1], payload[3], payload[4], payload[5]);
            let mut bytes = *frame.as_bytes();
            bytes[index] = bytes[index].wrapping_add(delta);
            prop_assert!(!DecodedFrame::from_bytes(bytes).verify());
        }

        #[test]
        fn prop_single_bit_flip_detected(
            payload in prop::array::uniform6(any::<u8>()),
            index in 0usize..DECODED_FRAME_LEN,
            bit in 0u8..8,
        ) {
            let frame = DecodedFrame::new(payload[0], payload[1], payload[3], payload[4], payload[5]);
            let mut bytes = *frame.as_bytes();
            bytes[index] ^= 1 << bit;
            prop_assert!(!DecodedFrame::from_bytes(bytes).verify());
        }
    }
}
