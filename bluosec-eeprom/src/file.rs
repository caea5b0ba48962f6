//! File-backed EEPROM image.
//!
//! On-disk layout: the raw cells followed by a little-endian CRC32C of the
//! cells. Each write updates the cell and the trailer in place and syncs
//! before returning.

use crate::error::EepromError;
use crate::layout::ERASED;
use crate::{check_offset, Eeprom};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Trailer size in bytes.
pub const CRC_SIZE: usize = 4;

struct Inner {
    file: File,
    cells: Vec<u8>,
}

/// Persistent image stored in a single file.
pub struct FileEeprom {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileEeprom {
    /// Opens the image at `path`, creating an erased one if it is missing.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self, EepromError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if path.exists() {
            Self::open_existing(path, size)
        } else {
            Self::create(path, size)
        }
    }

    fn create(path: PathBuf, size: usize) -> Result<Self, EepromError> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let cells = vec![ERASED; size];
        file.write_all(&cells)?;
        file.write_all(&crc32c::crc32c(&cells).to_le_bytes())?;
        file.sync_all()?;

        tracing::info!("Created EEPROM image {} ({} bytes)", path.display(), size);

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, cells }),
        })
    }

    fn open_existing(path: PathBuf, size: usize) -> Result<Self, EepromError> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut data = Vec::with_capacity(size + CRC_SIZE);
        file.read_to_end(&mut data)?;
        if data.len() != size + CRC_SIZE {
            return Err(EepromError::SizeMismatch {
                expected: size + CRC_SIZE,
                actual: data.len(),
            });
        }

        let trailer = data.split_off(size);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = crc32c::crc32c(&data);
        if expected != actual {
            return Err(EepromError::Corrupted { expected, actual });
        }

        tracing::debug!("Opened EEPROM image {}", path.display());

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, cells: data }),
        })
    }

    /// Returns the image file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current contents.
    pub fn image(&self) -> Vec<u8> {
        self.inner.lock().cells.clone()
    }
}

impl Eeprom for FileEeprom {
    fn read_byte(&self, offset: u16) -> Result<u8, EepromError> {
        let inner = self.inner.lock();
        let index = check_offset(offset, inner.cells.len())?;
        Ok(inner.cells[index])
    }

    fn write_byte(&self, offset: u16, value: u8) -> Result<(), EepromError> {
        let mut inner = self.inner.lock();
        let index = check_offset(offset, inner.cells.len())?;

        let previous = inner.cells[index];
        inner.cells[index] = value;
        let crc = crc32c::crc32c(&inner.cells);
        let size = inner.cells.len() as u64;

        let result = (|| -> std::io::Result<()> {
            inner.file.seek(SeekFrom::Start(index as u64))?;
            inner.file.write_all(&[value])?;
            inner.file.seek(SeekFrom::Start(size))?;
            inner.file.write_all(&crc.to_le_bytes())?;
            inner.file.sync_data()
        })();

        if let Err(e) = result {
            inner.cells[index] = previous;
            tracing::error!("EEPROM write at {:#06x} failed: {}", offset, e);
            return Err(e.into());
        }

        Ok(())
    }

    fn size(&self) -> usize {
        self.inner.lock().cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_erased() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eeprom.bin");

        let eeprom = FileEeprom::open(&path, 32).unwrap();
        assert_eq!(eeprom.size(), 32);
        assert_eq!(eeprom.read_byte(0).unwrap(), ERASED);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32 + CRC_SIZE as u64);
    }

    #[test]
    fn test_writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("eeprom.bin");

        {
            let eeprom = FileEeprom::open(&path, 32).unwrap();
            eeprom.write_byte(0, 142).unwrap();
            eeprom.write_u16(3, 0x0100).unwrap();
        }

        let eeprom = FileEeprom::open(&path, 32).unwrap();
        assert_eq!(eeprom.read_byte(0).unwrap(), 142);
        assert_eq!(eeprom.read_u16(3).unwrap(), 0x0100);
        assert_eq!(eeprom.path(), path.as_path());
    }

    #[test]
    fn test_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eeprom.bin");

        {
            let eeprom = FileEeprom::open(&path, 16).unwrap();
            eeprom.write_byte(5, 0x42).unwrap();
        }

        let mut data = std::fs::read(&path).unwrap();
        data[5] ^= 0x01;
        std::fs::write(&path, &data).unwrap();

        assert!(matches!(
            FileEeprom::open(&path, 16),
            Err(EepromError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_detects_size_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eeprom.bin");
        drop(FileEeprom::open(&path, 16).unwrap());

        assert!(matches!(
            FileEeprom::open(&path, 32),
            Err(EepromError::SizeMismatch {
                expected: 36,
                actual: 20
            })
        ));
    }

    #[test]
    fn test_out_of_range() {
        let dir = TempDir::new().unwrap();
        let eeprom = FileEeprom::open(dir.path().join("eeprom.bin"), 8).unwrap();
        assert!(matches!(
            eeprom.write_byte(8, 1),
            Err(EepromError::OutOfRange { offset: 8, size: 8 })
        ));
    }

    proptest! {
        #[test]
        fn prop_image_matches_writes(writes in prop::collection::vec((0u16..64, any::<u8>()), 0..32)) {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("eeprom.bin");

            let mut expected = vec![ERASED; 64];
            {
                let eeprom = FileEeprom::open(&path, 64).unwrap();
                for &(offset, value) in &writes {
                    eeprom.write_byte(offset, value).unwrap();
                    expected[offset as usize] = value;
                }
            }

            let reopened = FileEeprom::open(&path, 64).unwrap();
            prop_assert_eq!(reopened.image(), expected);
        }
    }
}
