//! # bluosec-core
//!
//! Protocol engine of the BluOsec display link.
//!
//! This crate provides:
//! - The receive assembler (SPSC byte queue, frame by length)
//! - Request routing with checksum error echoes
//! - Telemetry and configuration payload builders
//! - The configuration write handler and its EEPROM persistence
//! - The response emitter

pub mod assembler;
pub mod builders;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod field;
pub mod signal;
pub mod storage;
pub mod telemetry;
pub mod write;

pub use assembler::{Assembler, ByteReceiver, FrameAssembler};
pub use config::ControllerConfig;
pub use emitter::{emit, Transport};
pub use engine::{Engine, Outcome, Reply};
pub use error::CoreError;
pub use field::{ConfigField, Slot};
pub use signal::{NoSignals, Signal, SignalRecorder, SignalSink};
pub use storage::{load_or_init, InitOutcome};
pub use telemetry::{Telemetry, TelemetrySource};
pub use write::{WriteRequest, WriteResult};
