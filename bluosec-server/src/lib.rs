//! # bluosec-server
//!
//! Link service for the BluOsec display protocol.
//!
//! This crate provides:
//! - A TCP bridge standing in for the serial line, one engine shared by all links
//! - YAML and environment configuration
//! - Simulated telemetry
//! - Prometheus metrics over HTTP

pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod telemetry;

pub use config::{Config, ConfigError, EepromConfig, MetricsConfig, NetworkConfig, TelemetryConfig};
pub use error::ServerError;
pub use metrics::{run_metrics_server, Metrics};
pub use server::{open_engine, LinkSignals, Server, ServerConfig, ServerStats, SharedEngine};
pub use telemetry::SimulatedTelemetry;
