//! # bluosec-client
//!
//! Display-side requester for the BluOsec link.
//!
//! This crate provides:
//! - Async connection over TCP or any byte stream, one request in flight
//! - Strict response parsing with checksum verification
//! - High-level calls for telemetry, the configuration snapshot and writes

pub mod client;
pub mod connection;
pub mod error;

pub use client::{raw_request, Client};
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
