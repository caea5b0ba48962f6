//! Connection management.

use crate::error::ClientError;
use bluosec_protocol::{Decoder, RawRequest, ResponseFrame};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 256;

/// Minimum read buffer size.
pub const MIN_READ_BUFFER_SIZE: usize = 16;

/// Maximum read buffer size (64 KiB).
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Link address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Time to wait for a response. Requests to silent addresses end here.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(1),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

/// A half-duplex link to a controller.
///
/// One request is in flight at a time; the next request is written only
/// after the previous response arrived or timed out.
pub struct Connection<S = TcpStream> {
    stream: S,
    decoder: Decoder,
    request_timeout: Duration,
    read_buffer_size: usize,
}

impl Connection<TcpStream> {
    /// Connects to a link service.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.addr))
            .await
            .map_err(|_| {
                tracing::debug!("Connection timeout");
                ClientError::Timeout
            })?
            .map_err(|e| {
                tracing::debug!("Connection failed: {}", e);
                ClientError::Io(e)
            })?;

        stream.set_nodelay(true).ok();
        tracing::debug!("Connected to {}", config.addr);

        Ok(Self::new(stream, config))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Wraps an established byte stream.
    pub fn new(stream: S, config: &ConnectionConfig) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            request_timeout: config.request_timeout,
            read_buffer_size: config.read_buffer_size,
        }
    }

    /// Sends a request frame and waits for the next response frame.
    pub async fn request(&mut self, raw: &RawRequest) -> Result<ResponseFrame, ClientError> {
        self.send(raw.as_bytes()).await?;
        self.read_response().await
    }

    /// Writes raw bytes to the link.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        // Leftovers belong to an earlier, abandoned request.
        self.decoder.clear();
        tracing::debug!("Sending {} bytes", bytes.len());
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads until one complete response frame is decoded.
    pub async fn read_response(&mut self) -> Result<ResponseFrame, ClientError> {
        let timeout = self.request_timeout;
        let mut buf = vec![0u8; self.read_buffer_size];

        tokio::time::timeout(timeout, async {
            loop {
                if let Some(response) = self.decoder.decode_response()? {
                    tracing::debug!(
                        "Decoded response address={:#04x} function={:#04x} ({} pairs)",
                        response.address,
                        response.function,
                        response.pairs.len()
                    );
                    return Ok(response);
                }

                let n = self.stream.read(&mut buf).await?;
                if n == 0 {
                    tracing::debug!("Connection closed (0 bytes)");
                    return Err(ClientError::ConnectionClosed);
                }
                tracing::trace!("Read {} bytes", n);
                self.decoder.extend(&buf[..n]);
            }
        })
        .await
        .map_err(|_| {
            tracing::debug!("Response timeout");
            ClientError::Timeout
        })?
    }

    /// Shuts down the write side.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
