//! Request router - turns one decoded request into at most one response.

use crate::builders;
use crate::config::ControllerConfig;
use crate::emitter::{emit, Transport};
use crate::error::CoreError;
use crate::signal::{NoSignals, SignalSink};
use crate::storage::{load_or_init, InitOutcome};
use crate::telemetry::Telemetry;
use crate::write::{handle_write, WriteRequest, WriteResult};
use bluosec_eeprom::Eeprom;
use bluosec_protocol::{
    Address, Code, DecodedFrame, Function, PayloadPair, RawRequest, Response,
};

/// How a request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Telemetry response for a dynamic data function.
    Telemetry(Function),
    /// Configuration snapshot.
    Snapshot,
    /// Known address, unknown function; answered with the error pair.
    UnknownFunction { address: Address, function: u8 },
    /// Configuration write.
    ConfigWrite(WriteResult),
    /// LRC mismatch; answered with the error echo.
    ChecksumMismatch { expected: u8, received: u8 },
    /// Address without a handler; nothing sent.
    Ignored { address: u8 },
    /// Response could not be built; nothing sent.
    Failed(&'static str),
}

impl Outcome {
    /// Label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Telemetry(_) => "telemetry",
            Outcome::Snapshot => "snapshot",
            Outcome::UnknownFunction { .. } => "unknown_function",
            Outcome::ConfigWrite(_) => "config_write",
            Outcome::ChecksumMismatch { .. } => "checksum_mismatch",
            Outcome::Ignored { .. } => "ignored",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub outcome: Outcome,
    /// Unsigned response; `None` when nothing is sent.
    pub response: Option<Response>,
}

/// The protocol engine.
///
/// Owns the configuration mirror and the storage it is persisted to.
/// Telemetry is passed in per request.
pub struct Engine<E, S = NoSignals> {
    config: ControllerConfig,
    eeprom: E,
    signals: S,
}

impl<E: Eeprom> Engine<E, NoSignals> {
    /// Starts an engine that discards signals.
    pub fn start(eeprom: E, defaults: &ControllerConfig) -> Result<(Self, InitOutcome), CoreError> {
        Engine::with_signals(eeprom, defaults, NoSignals)
    }
}

impl<E: Eeprom, S: SignalSink> Engine<E, S> {
    /// Loads the mirror from `eeprom`, initializing storage with `defaults`
    /// if its magic byte does not match.
    pub fn with_signals(
        eeprom: E,
        defaults: &ControllerConfig,
        signals: S,
    ) -> Result<(Self, InitOutcome), CoreError> {
        defaults.validate()?;
        let (config, outcome) = load_or_init(&eeprom, defaults)?;
        Ok((
            Self {
                config,
                eeprom,
                signals,
            },
            outcome,
        ))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn eeprom(&self) -> &E {
        &self.eeprom
    }

    pub fn signals(&self) -> &S {
        &self.signals
    }

    /// Decodes, verifies and routes one raw request.
    pub fn handle_frame(&mut self, raw: &RawRequest, telemetry: &Telemetry) -> Reply {
        let frame = DecodedFrame::decode(raw);
        match self.route(&frame, telemetry) {
            Ok(reply) => {
                tracing::debug!(
                    "Request {:02X?} -> {}",
                    frame.as_bytes(),
                    reply.outcome.as_str()
                );
                reply
            }
            Err(e) => {
                tracing::error!("Failed to answer request {:02X?}: {}", frame.as_bytes(), e);
                Reply {
                    outcome: Outcome::Failed(e.error_code()),
                    response: None,
                }
            }
        }
    }

    /// Handles one raw request and emits the response, if any.
    pub fn process<T: Transport + ?Sized>(
        &mut self,
        raw: &RawRequest,
        telemetry: &Telemetry,
        transport: &mut T,
    ) -> Outcome {
        let reply = self.handle_frame(raw, telemetry);
        if let Some(response) = &reply.response {
            emit(response, transport);
        }
        reply.outcome
    }

    fn route(&mut self, frame: &DecodedFrame, telemetry: &Telemetry) -> Result<Reply, CoreError> {
        let calculated = frame.expected_checksum();
        if calculated != frame.checksum() {
            tracing::warn!(
                "Checksum mismatch: expected {:#04x}, received {:#04x}",
                calculated,
                frame.checksum()
            );
            return Ok(Reply {
                outcome: Outcome::ChecksumMismatch {
                    expected: calculated,
                    received: frame.checksum(),
                },
                response: Some(error_echo(frame, calculated)?),
            });
        }

        let mut response = Response::new(frame.address(), frame.function());
        let function = Function::try_from(frame.function()).ok();

        let outcome = match Address::try_from(frame.address()) {
            Ok(address @ Address::DynamicData) => match function {
                Some(f @ Function::BasicInfos) => {
                    response.extend(&builders::basic(telemetry, &self.config))?;
                    Outcome::Telemetry(f)
                }
                Some(f @ Function::DetailInfos) => {
                    response.extend(&builders::detail(telemetry, &self.config))?;
                    Outcome::Telemetry(f)
                }
                Some(f @ Function::HallInfos) => {
                    response.extend(&builders::hall(telemetry))?;
                    Outcome::Telemetry(f)
                }
                _ => unknown_function(&mut response, address, frame.function())?,
            },
            Ok(address @ Address::StaticData) => match function {
                Some(Function::ConfigInfos) => {
                    response.extend(&builders::config(&self.config))?;
                    Outcome::Snapshot
                }
                _ => unknown_function(&mut response, address, frame.function())?,
            },
            Ok(address @ (Address::Config | Address::Eeprom)) => {
                let request = WriteRequest {
                    address,
                    code: frame.code(),
                    value_high: frame.value_high(),
                    value: frame.value(),
                };
                let result = handle_write(
                    &mut self.config,
                    &self.eeprom,
                    &self.signals,
                    request,
                    &mut response,
                )?;
                Outcome::ConfigWrite(result)
            }
            Ok(Address::Error) | Err(_) => {
                tracing::debug!("Ignoring request for address {:#04x}", frame.address());
                return Ok(Reply {
                    outcome: Outcome::Ignored {
                        address: frame.address(),
                    },
                    response: None,
                });
            }
        };

        response.push(PayloadPair::new(Code::LrcCheck, calculated))?;

        Ok(Reply {
            outcome,
            response: Some(response),
        })
    }
}

fn unknown_function(
    response: &mut Response,
    address: Address,
    function: u8,
) -> Result<Outcome, CoreError> {
    tracing::debug!("Unknown function {:#04x} for {}", function, address);
    response.push(PayloadPair::error())?;
    Ok(Outcome::UnknownFunction { address, function })
}

/// Echo of a corrupted request: every received byte tagged with an error
/// code, then the checksum it should have carried.
fn error_echo(frame: &DecodedFrame, calculated: u8) -> Result<Response, CoreError> {
    let mut response = Response::new(Address::Error.as_u8(), frame.function());
    for (index, &byte) in frame.as_bytes().iter().enumerate() {
        response.push(PayloadPair::raw(Code::error_echo(index as u8), byte))?;
    }
    response.push(PayloadPair::new(Code::LrcCheck, calculated))?;
    Ok(response)
}
