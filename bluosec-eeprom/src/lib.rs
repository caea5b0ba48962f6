//! # bluosec-eeprom
//!
//! Byte-addressed persistent storage for controller configuration.
//!
//! This crate provides:
//! - The [`Eeprom`] trait the controller writes through
//! - A file-backed image with a CRC32C trailer, synced on every write
//! - An in-memory image for tests and volatile setups
//! - The storage layout of persisted fields

pub mod error;
pub mod file;
pub mod layout;
pub mod memory;

pub use error::EepromError;
pub use file::FileEeprom;
pub use memory::MemoryEeprom;

use std::sync::Arc;

/// Byte-addressed non-volatile storage.
///
/// Writes take `&self`; implementations synchronize internally so one image
/// can be shared between the engine and tooling.
pub trait Eeprom: Send + Sync {
    /// Reads one byte.
    fn read_byte(&self, offset: u16) -> Result<u8, EepromError>;

    /// Writes one byte. Returns once the byte is durable.
    fn write_byte(&self, offset: u16, value: u8) -> Result<(), EepromError>;

    /// Image size in bytes.
    fn size(&self) -> usize;

    /// Reads a 16-bit value stored high byte first at `offset`.
    fn read_u16(&self, offset: u16) -> Result<u16, EepromError> {
        let next = next_offset(offset, self.size())?;
        let high = self.read_byte(offset)?;
        let low = self.read_byte(next)?;
        Ok(u16::from_be_bytes([high, low]))
    }

    /// Writes a 16-bit value, high byte first.
    fn write_u16(&self, offset: u16, value: u16) -> Result<(), EepromError> {
        let next = next_offset(offset, self.size())?;
        let [high, low] = value.to_be_bytes();
        self.write_byte(offset, high)?;
        self.write_byte(next, low)
    }
}

impl<E: Eeprom + ?Sized> Eeprom for Arc<E> {
    fn read_byte(&self, offset: u16) -> Result<u8, EepromError> {
        (**self).read_byte(offset)
    }

    fn write_byte(&self, offset: u16, value: u8) -> Result<(), EepromError> {
        (**self).write_byte(offset, value)
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

impl<E: Eeprom + ?Sized> Eeprom for Box<E> {
    fn read_byte(&self, offset: u16) -> Result<u8, EepromError> {
        (**self).read_byte(offset)
    }

    fn write_byte(&self, offset: u16, value: u8) -> Result<(), EepromError> {
        (**self).write_byte(offset, value)
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

/// Bounds check shared by the implementations.
pub(crate) fn check_offset(offset: u16, size: usize) -> Result<usize, EepromError> {
    let index = offset as usize;
    if index < size {
        Ok(index)
    } else {
        Err(EepromError::OutOfRange { offset, size })
    }
}

/// Offset of the low byte of a 16-bit value at `offset`.
fn next_offset(offset: u16, size: usize) -> Result<u16, EepromError> {
    offset
        .checked_add(1)
        .ok_or(EepromError::OutOfRange { offset, size })
}
