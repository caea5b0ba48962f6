//! Loading and persisting the configuration mirror.

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::field::{ConfigField, Slot};
use bluosec_eeprom::{layout, Eeprom, EepromError};

/// How the mirror was obtained at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The stored magic byte matched; values came from EEPROM.
    Loaded,
    /// Storage was blank or stale; factory defaults were written.
    Initialized,
}

/// Writes one field's current value to its slot, high byte first.
///
/// Fields without a slot are a no-op.
pub fn persist_field<E: Eeprom + ?Sized>(
    eeprom: &E,
    field: ConfigField,
    config: &ControllerConfig,
) -> Result<(), EepromError> {
    let value = field.wire_value(config);
    match field.slot() {
        Some(Slot::Byte(offset)) => eeprom.write_byte(offset, value as u8),
        Some(Slot::Wide { high, low }) => {
            eeprom.write_byte(high, (value >> 8) as u8)?;
            eeprom.write_byte(low, value as u8)
        }
        None => Ok(()),
    }
}

/// Reads one field from its slot into the mirror.
pub fn load_field<E: Eeprom + ?Sized>(
    eeprom: &E,
    field: ConfigField,
    config: &mut ControllerConfig,
) -> Result<(), EepromError> {
    match field.slot() {
        Some(Slot::Byte(offset)) => {
            let value = eeprom.read_byte(offset)?;
            field.apply(config, 0, value);
        }
        Some(Slot::Wide { high, low }) => {
            let value_high = eeprom.read_byte(high)?;
            let value = eeprom.read_byte(low)?;
            field.apply(config, value_high, value);
        }
        None => {}
    }
    Ok(())
}

/// Builds the start-up mirror.
///
/// When the stored magic byte equals `defaults.magic_byte` every persisted
/// field is read from storage. Otherwise the defaults are written to every
/// slot, then the magic byte, so an interrupted initialization is retried on
/// the next start. Either way the mirror holds what storage holds, so a
/// restart without writes yields the same configuration.
pub fn load_or_init<E: Eeprom + ?Sized>(
    eeprom: &E,
    defaults: &ControllerConfig,
) -> Result<(ControllerConfig, InitOutcome), CoreError> {
    if eeprom.size() < layout::CONFIG_END as usize {
        return Err(CoreError::InvalidConfig {
            reason: format!(
                "EEPROM holds {} bytes, configuration needs {}",
                eeprom.size(),
                layout::CONFIG_END
            ),
        });
    }

    let stored_magic = eeprom.read_byte(layout::MAGIC_BYTE)?;
    let mut config = defaults.clone();

    if stored_magic == defaults.magic_byte {
        for field in ConfigField::ALL {
            load_field(eeprom, field, &mut config)?;
        }
        tracing::info!("Loaded configuration from EEPROM (magic {})", stored_magic);
        return Ok((config, InitOutcome::Loaded));
    }

    tracing::info!(
        "EEPROM magic {} does not match {}, writing factory defaults",
        stored_magic,
        defaults.magic_byte
    );
    for field in ConfigField::ALL {
        persist_field(eeprom, field, &config)?;
    }
    eeprom.write_byte(layout::MAGIC_BYTE, defaults.magic_byte)?;
    config.magic_byte = defaults.magic_byte;

    // Stored forms are quantized, shifted or truncated.
    for field in ConfigField::ALL {
        load_field(eeprom, field, &mut config)?;
    }

    Ok((config, InitOutcome::Initialized))
}
