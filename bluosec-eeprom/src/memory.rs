//! In-memory EEPROM image.

use crate::error::EepromError;
use crate::layout::ERASED;
use crate::{check_offset, Eeprom};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Volatile image that records every write in order.
pub struct MemoryEeprom {
    cells: Mutex<Vec<u8>>,
    writes: Mutex<Vec<(u16, u8)>>,
    fail_writes: AtomicBool,
}

impl MemoryEeprom {
    /// Creates an erased image of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::from_image(vec![ERASED; size])
    }

    /// Wraps existing contents.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            cells: Mutex::new(image),
            writes: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Copy of the current contents.
    pub fn image(&self) -> Vec<u8> {
        self.cells.lock().clone()
    }

    /// Every `(offset, value)` written so far, oldest first.
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Makes subsequent writes fail, simulating a worn-out part.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Eeprom for MemoryEeprom {
    fn read_byte(&self, offset: u16) -> Result<u8, EepromError> {
        let cells = self.cells.lock();
        let index = check_offset(offset, cells.len())?;
        Ok(cells[index])
    }

    fn write_byte(&self, offset: u16, value: u8) -> Result<(), EepromError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EepromError::WriteRejected(format!(
                "write to {:#06x} failed",
                offset
            )));
        }
        let mut cells = self.cells.lock();
        let index = check_offset(offset, cells.len())?;
        cells[index] = value;
        self.writes.lock().push((offset, value));
        Ok(())
    }

    fn size(&self) -> usize {
        self.cells.lock().len()
    }
}
