//! bluosec-cli - Command-line requester for the BluOsec display link
//!
//! Sends one request per invocation and prints the decoded response.

mod commands;

use bluosec_client::{Client, ConnectionConfig};
use bluosec_core::ConfigField;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bluosec-cli")]
#[command(about = "Command-line requester for the BluOsec display link")]
#[command(version)]
struct Cli {
    /// Link service address
    #[arg(short, long, default_value = "127.0.0.1:7402", env = "BLUOSEC_LINK")]
    server: SocketAddr,

    /// Response timeout in milliseconds
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,

    /// Print responses as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read basic telemetry
    Basic,

    /// Read detailed telemetry
    Detail,

    /// Read hall sensor telemetry
    Hall,

    /// Read the configuration snapshot
    Config,

    /// Write a configuration field
    Write {
        /// Field name (e.g. max_speed_default, pas_threshold)
        field: ConfigField,

        /// Wire value, decimal or 0x-prefixed hex
        value: String,

        /// Persist to EEPROM instead of RAM only
        #[arg(long)]
        persist: bool,
    },

    /// Send raw request bytes: 6 bytes are signed, 7 are sent as given
    Raw {
        /// Hex string, e.g. 100100000000
        hex: String,
    },

    /// Print an encoded request without connecting
    Frame {
        /// Address name or number
        address: String,

        /// Function name or number
        function: String,

        /// Payload code name or number
        #[arg(long)]
        code: Option<String>,

        /// 16-bit value
        #[arg(long, default_value = "0")]
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Frame encoding needs no link
    if let Commands::Frame { .. } = cli.command {
        match commands::frame(&cli.command, cli.json) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let config =
        ConnectionConfig::new(cli.server).with_request_timeout(Duration::from_millis(cli.timeout_ms));
    tracing::debug!("Requesting {} with timeout {}ms", cli.server, cli.timeout_ms);
    let mut client = Client::connect(&config).await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    match commands::execute(&mut client, cli.command, cli.json).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close().await?;
    Ok(())
}
