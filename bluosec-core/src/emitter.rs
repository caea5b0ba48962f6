//! Response emitter.

use bluosec_protocol::{encode_frame, Response, MAX_RESPONSE_FRAME_LEN};
use bytes::{BufMut, BytesMut};

/// Outbound side of the byte transport.
pub trait Transport {
    fn send_byte(&mut self, byte: u8);
}

impl Transport for Vec<u8> {
    fn send_byte(&mut self, byte: u8) {
        self.push(byte);
    }
}

impl Transport for BytesMut {
    fn send_byte(&mut self, byte: u8) {
        self.put_u8(byte);
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_byte(&mut self, byte: u8) {
        (**self).send_byte(byte)
    }
}

/// Signs `response` and writes it byte by byte. Returns the bytes sent.
pub fn emit<T: Transport + ?Sized>(response: &Response, transport: &mut T) -> usize {
    let signed = response.signed_bytes();
    let mut frame = [0u8; MAX_RESPONSE_FRAME_LEN];
    let len = {
        let mut out = &mut frame[..];
        encode_frame(&signed, &mut out);
        MAX_RESPONSE_FRAME_LEN - out.len()
    };
    for &byte in &frame[..len] {
        transport.send_byte(byte);
    }
    len
}
