//! Encoder and streaming decoder for display-side traffic.

use crate::error::ProtocolError;
use crate::frame::{RawRequest, START_DELIMITER, TERMINATOR};
use crate::message::{Request, Response, ResponseFrame, MAX_RESPONSE_FRAME_LEN};
use bytes::{Buf, Bytes, BytesMut};

/// Encodes requests and responses into raw frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into its 17-byte raw frame.
    pub fn encode_request(request: &Request) -> RawRequest {
        request.encode()
    }

    /// Encodes a response into a raw frame.
    pub fn encode_response(response: &Response) -> BytesMut {
        response.encode()
    }
}

/// Splits a byte stream into response frames.
///
/// Bytes before a start delimiter are discarded. A frame that grows past
/// the largest legal response without a terminator is dropped and reported.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_RESPONSE_FRAME_LEN * 2),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the next complete raw frame, terminator included.
    pub fn decode_raw(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        match self.buffer.iter().position(|&b| b == START_DELIMITER) {
            Some(start) => self.buffer.advance(start),
            None => {
                self.buffer.clear();
                return Ok(None);
            }
        }

        let end = self
            .buffer
            .windows(TERMINATOR.len())
            .position(|w| w == TERMINATOR);

        match end {
            Some(pos) if pos + TERMINATOR.len() > MAX_RESPONSE_FRAME_LEN => {
                let size = pos + TERMINATOR.len();
                self.buffer.advance(size);
                Err(ProtocolError::FrameTooLarge {
                    size,
                    max: MAX_RESPONSE_FRAME_LEN,
                })
            }
            Some(pos) => Ok(Some(self.buffer.split_to(pos + TERMINATOR.len()).freeze())),
            None if self.buffer.len() > MAX_RESPONSE_FRAME_LEN => {
                let size = self.buffer.len();
                // Keep a trailing CR, it may start the terminator of the next frame.
                let keep = usize::from(self.buffer.last() == Some(&TERMINATOR[0]));
                self.buffer.advance(size - keep);
                Err(ProtocolError::FrameTooLarge {
                    size,
                    max: MAX_RESPONSE_FRAME_LEN,
                })
            }
            None => Ok(None),
        }
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<ResponseFrame>, ProtocolError> {
        match self.decode_raw()? {
            Some(raw) => ResponseFrame::parse(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
