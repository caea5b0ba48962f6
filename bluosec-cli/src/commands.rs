//! Command execution.

use crate::Commands;
use bluosec_client::Client;
use bluosec_protocol::{
    Address, Code, Function, PayloadPair, Request, ResponseFrame, TERMINATOR,
};
use colored::Colorize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};

type CmdResult = Result<String, Box<dyn std::error::Error>>;

/// Executes a command against the link and returns the formatted output.
pub async fn execute<S>(client: &mut Client<S>, cmd: Commands, as_json: bool) -> CmdResult
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (title, response) = match cmd {
        Commands::Basic => ("Basic telemetry".to_string(), client.basic_info().await?),
        Commands::Detail => ("Detailed telemetry".to_string(), client.detail_info().await?),
        Commands::Hall => ("Hall telemetry".to_string(), client.hall_info().await?),
        Commands::Config => ("Configuration".to_string(), client.config_info().await?),
        Commands::Write {
            field,
            value,
            persist,
        } => {
            let value = parse_u16(&value)?;
            let response = client.write_config(field.code(), value, persist).await?;
            let mode = if persist { "persisted" } else { "volatile" };
            (format!("Wrote {} ({})", field, mode), response)
        }
        Commands::Raw { hex } => {
            let bytes = hex::decode(hex.trim())?;
            ("Raw response".to_string(), client.raw(&bytes).await?)
        }
        Commands::Frame { .. } => return frame(&cmd, as_json),
    };

    if as_json {
        Ok(serde_json::to_string_pretty(&response_json(&response))?)
    } else {
        Ok(format_response(&title, &response))
    }
}

/// Encodes a request offline.
pub fn frame(cmd: &Commands, as_json: bool) -> CmdResult {
    let Commands::Frame {
        address,
        function,
        code,
        value,
    } = cmd
    else {
        return Err("not a frame command".into());
    };

    let address = parse_address(address)?;
    let function = parse_function(function)?;
    let code = code.as_deref().map(parse_code).transpose()?.unwrap_or(0);
    let value = parse_u16(value)?;

    let request = Request {
        address,
        function,
        code,
        value,
    };
    let decoded = request.to_decoded();
    let raw = request.encode();
    let text = String::from_utf8_lossy(&raw.as_bytes()[..raw.as_bytes().len() - TERMINATOR.len()])
        .into_owned();

    if as_json {
        return Ok(serde_json::to_string_pretty(&json!({
            "frame": text,
            "bytes": hex::encode_upper(decoded.as_bytes()),
            "checksum": decoded.checksum(),
        }))?);
    }

    Ok(format!(
        "{}\\r\\n\n  Bytes: {}\n  LRC: {}",
        text.cyan(),
        hex::encode_upper(decoded.as_bytes()),
        format!("{:#04x}", decoded.checksum()).yellow()
    ))
}

/// Display name of a pair code. Echo frames tag request bytes instead.
fn code_name(pair: &PayloadPair, echo: bool) -> String {
    if echo && Code::is_error_echo(pair.code) {
        return format!("echo[{}]", pair.code - Code::ERROR_ECHO_BASE);
    }
    match pair.known_code() {
        Some(code) => code.name().to_string(),
        None => format!("{:#04x}", pair.code),
    }
}

fn address_name(address: u8) -> String {
    Address::try_from(address)
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|_| format!("{:#04x}", address))
}

/// Formats a response as an aligned table.
pub fn format_response(title: &str, response: &ResponseFrame) -> String {
    let mut output = format!(
        "{} ({} / function {:#04x})\n",
        title.bold(),
        address_name(response.address),
        response.function
    );

    if response.is_error_echo() {
        output.push_str(&format!("  {}\n", "Checksum error echo".red()));
    } else if response.has_error_pair() {
        output.push_str(&format!("  {}\n", "Rejected by controller".red()));
    }

    for pair in response.data_pairs() {
        output.push_str(&format!(
            "  {:<28} {:>5}  {}\n",
            code_name(pair, response.is_error_echo()).cyan(),
            pair.value,
            format!("0x{:02X}", pair.value).dimmed()
        ));
    }

    if let Some(check) = response.lrc_check() {
        output.push_str(&format!(
            "  {}",
            format!("request LRC echo: {:#04x}", check).dimmed()
        ));
    }
    output
}

/// Converts a response into JSON.
pub fn response_json(response: &ResponseFrame) -> Value {
    let pairs: Vec<Value> = response
        .pairs
        .iter()
        .map(|p| {
            json!({
                "code": p.code,
                "name": code_name(p, response.is_error_echo()),
                "value": p.value,
            })
        })
        .collect();

    json!({
        "address": response.address,
        "address_name": address_name(response.address),
        "function": response.function,
        "error_echo": response.is_error_echo(),
        "rejected": response.has_error_pair(),
        "pairs": pairs,
        "checksum": response.checksum,
    })
}

/// Parses a decimal or `0x`-prefixed number.
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let n = parse_number(s)?;
    u16::try_from(n).map_err(|_| format!("value {} does not fit in 16 bits", n))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let n = parse_number(s)?;
    u8::try_from(n).map_err(|_| format!("value {} does not fit in a byte", n))
}

fn parse_address(s: &str) -> Result<u8, String> {
    let known = [
        Address::DynamicData,
        Address::StaticData,
        Address::Config,
        Address::Eeprom,
        Address::Error,
    ];
    match known.iter().find(|a| a.as_str() == s.to_ascii_lowercase()) {
        Some(address) => Ok(address.as_u8()),
        None => parse_u8(s),
    }
}

fn parse_function(s: &str) -> Result<u8, String> {
    let function = match s.to_ascii_lowercase().as_str() {
        "basic" => Function::BasicInfos,
        "detail" => Function::DetailInfos,
        "hall" => Function::HallInfos,
        "config" => Function::ConfigInfos,
        _ => return parse_u8(s),
    };
    Ok(function.as_u8())
}

fn parse_code(s: &str) -> Result<u8, String> {
    let wanted = s.replace('-', "_").to_ascii_lowercase();
    match Code::ALL.iter().find(|c| c.name() == wanted) {
        Some(code) => Ok(code.as_u8()),
        None => parse_u8(s),
    }
}
