//! Configuration write handler.

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::field::ConfigField;
use crate::signal::{Signal, SignalSink};
use crate::storage::persist_field;
use bluosec_eeprom::Eeprom;
use bluosec_protocol::{Address, PayloadPair, Response};

/// A decoded write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub address: Address,
    pub code: u8,
    pub value_high: u8,
    pub value: u8,
}

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    /// Mirror updated; `persisted` when storage was written too.
    Applied { field: ConfigField, persisted: bool },
    /// Mirror updated but storage failed; acknowledged with the error pair.
    StorageFailed { field: ConfigField },
    /// Code is not writable; nothing changed.
    UnknownCode(u8),
}

impl WriteResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteResult::Applied { persisted: true, .. } => "persisted",
            WriteResult::Applied { persisted: false, .. } => "volatile",
            WriteResult::StorageFailed { .. } => "storage_failed",
            WriteResult::UnknownCode(_) => "unknown_code",
        }
    }
}

/// Applies one write and appends its acknowledgment to `response`.
///
/// The mirror is updated first. Storage is written only for the EEPROM
/// address, one call per byte, high byte first. The acknowledgment carries
/// the mirror's value after the update.
pub fn handle_write<E, S>(
    config: &mut ControllerConfig,
    eeprom: &E,
    signals: &S,
    request: WriteRequest,
    response: &mut Response,
) -> Result<WriteResult, CoreError>
where
    E: Eeprom + ?Sized,
    S: SignalSink + ?Sized,
{
    let Some(field) = ConfigField::from_code(request.code) else {
        tracing::debug!("Write to unknown code {:#04x}", request.code);
        response.push(PayloadPair::error())?;
        return Ok(WriteResult::UnknownCode(request.code));
    };

    field.apply(config, request.value_high, request.value);

    let persist = request.address.persists() && field.slot().is_some();
    let stored = if persist {
        persist_field(eeprom, field, config)
    } else {
        Ok(())
    };

    if field.changes_speed_limit() {
        signals.raise(Signal::SpeedLimitChanged);
    }

    match stored {
        Ok(()) => {
            response.extend(&field.ack_pairs(config))?;
            tracing::debug!(
                "Config write {} = {} ({})",
                field,
                field.wire_value(config),
                if persist { "persisted" } else { "volatile" }
            );
            Ok(WriteResult::Applied {
                field,
                persisted: persist,
            })
        }
        Err(e) => {
            tracing::error!("Failed to persist {}: {}", field, e);
            response.push(PayloadPair::error())?;
            Ok(WriteResult::StorageFailed { field })
        }
    }
}
