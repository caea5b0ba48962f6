//! TCP bridge for the display link.
//!
//! Each accepted connection stands in for one serial line. Received bytes
//! are fed one at a time into a per-link [`Assembler`] and the assembler is
//! polled after every byte, so a request is answered as soon as its 17th
//! byte arrives. All links share a single engine behind a mutex; the lock is
//! held only while a frame is routed, never across I/O.

use crate::config::Config;
use crate::error::ServerError;
use crate::metrics::Metrics;
use bluosec_core::{
    Assembler, ControllerConfig, Engine, InitOutcome, Outcome, Signal, SignalSink, Slot,
    TelemetrySource, WriteResult,
};
use bluosec_eeprom::{Eeprom, FileEeprom, MemoryEeprom};
use bytes::BytesMut;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Engine shared by every link.
pub type SharedEngine = Arc<Mutex<Engine<Box<dyn Eeprom>, LinkSignals>>>;

/// Forwards engine signals to the log and to metrics.
#[derive(Clone, Default)]
pub struct LinkSignals {
    metrics: Option<Arc<Metrics>>,
    raised: Arc<AtomicU64>,
}

impl LinkSignals {
    pub fn new(metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            metrics,
            raised: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Signals raised since start.
    pub fn raised(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }
}

impl SignalSink for LinkSignals {
    fn raise(&self, signal: Signal) {
        tracing::info!("Signal raised: {}", signal.as_str());
        self.raised.fetch_add(1, Ordering::Relaxed);
        if let Some(ref metrics) = self.metrics {
            metrics
                .signals_total
                .with_label_values(&[signal.as_str()])
                .inc();
        }
    }
}

/// Opens the configured EEPROM image and starts the engine on it.
pub fn open_engine(
    config: &Config,
    metrics: Option<Arc<Metrics>>,
) -> Result<(SharedEngine, InitOutcome), ServerError> {
    let eeprom: Box<dyn Eeprom> = match config.eeprom.path {
        Some(ref path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            tracing::info!("Opening EEPROM image {}", path.display());
            Box::new(FileEeprom::open(path, config.eeprom.size)?)
        }
        None => {
            tracing::warn!("No EEPROM path configured, using a volatile image");
            Box::new(MemoryEeprom::new(config.eeprom.size))
        }
    };

    let (engine, outcome) =
        Engine::with_signals(eeprom, &config.controller, LinkSignals::new(metrics))?;
    match outcome {
        InitOutcome::Loaded => tracing::info!("Configuration loaded from EEPROM"),
        InitOutcome::Initialized => {
            tracing::info!("EEPROM initialized with factory defaults")
        }
    }

    Ok((Arc::new(Mutex::new(engine)), outcome))
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle link timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent links.
    pub max_connections: usize,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_connections", &self.max_connections)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], bluosec_protocol::DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(300),
            max_connections: 16,
            metrics: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the server section of a service configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            idle_timeout: config.network.idle_timeout(),
            max_connections: config.network.max_connections,
            metrics: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub frames_total: AtomicU64,
    pub checksum_errors_total: AtomicU64,
    pub dropped_bytes_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// State a link task needs besides its socket.
#[derive(Clone)]
struct LinkContext {
    engine: SharedEngine,
    telemetry: Arc<dyn TelemetrySource>,
    stats: Arc<ServerStats>,
    config: ServerConfig,
}

impl LinkContext {
    /// Feeds received bytes through the assembler and appends every
    /// response to `out`. Returns the number of frames handled.
    fn process_bytes(&self, assembler: &mut Assembler, bytes: &[u8], out: &mut BytesMut) -> usize {
        let mut frames = 0;
        for &byte in bytes {
            let dropped_before = assembler.dropped();
            assembler.receive_byte(byte);
            if assembler.dropped() != dropped_before {
                self.stats.dropped_bytes_total.fetch_add(1, Ordering::Relaxed);
                if let Some(ref metrics) = self.config.metrics {
                    metrics.dropped_bytes_total.inc();
                }
            }

            if let Some(raw) = assembler.poll_frame() {
                let started = Instant::now();
                let telemetry = self.telemetry.snapshot();
                let outcome = self.engine.lock().process(&raw, &telemetry, out);
                self.record(&outcome, started.elapsed());
                frames += 1;
            }
        }
        frames
    }

    fn record(&self, outcome: &Outcome, elapsed: Duration) {
        self.stats.frames_total.fetch_add(1, Ordering::Relaxed);
        if matches!(outcome, Outcome::ChecksumMismatch { .. }) {
            self.stats.checksum_errors_total.fetch_add(1, Ordering::Relaxed);
        }
        if matches!(outcome, Outcome::Failed(_)) {
            self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
        }

        let Some(ref metrics) = self.config.metrics else {
            return;
        };
        let label = outcome.as_str();
        metrics.frames_total.with_label_values(&[label]).inc();
        metrics
            .frame_duration
            .with_label_values(&[label])
            .observe(elapsed.as_secs_f64());
        match outcome {
            Outcome::ChecksumMismatch { .. } => metrics.checksum_errors_total.inc(),
            Outcome::ConfigWrite(result) => {
                metrics
                    .config_writes_total
                    .with_label_values(&[result.as_str()])
                    .inc();
                if let WriteResult::Applied {
                    field,
                    persisted: true,
                } = result
                {
                    let bytes = match field.slot() {
                        Some(Slot::Wide { .. }) => 2.0,
                        Some(Slot::Byte(_)) => 1.0,
                        None => 0.0,
                    };
                    metrics.eeprom_writes_total.inc_by(bytes);
                }
            }
            _ => {}
        }
    }
}

/// TCP bridge serving the display protocol.
pub struct Server {
    config: ServerConfig,
    engine: SharedEngine,
    telemetry: Arc<dyn TelemetrySource>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(
        config: ServerConfig,
        engine: SharedEngine,
        telemetry: Arc<dyn TelemetrySource>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            engine,
            telemetry,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Runs the server on an already bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            if let Some(ref metrics) = self.config.metrics {
                                metrics.connections_total.inc();
                                metrics.connections_active.inc();
                            }

                            let ctx = LinkContext {
                                engine: self.engine.clone(),
                                telemetry: self.telemetry.clone(),
                                stats: self.stats.clone(),
                                config: self.config.clone(),
                            };
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result =
                                    Self::handle_connection(stream, addr, &ctx, &mut conn_shutdown).await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    ctx.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                ctx.stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                if let Some(ref metrics) = ctx.config.metrics {
                                    metrics.connections_active.dec();
                                }

                                tracing::info!("Display disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Serves one link until it closes, idles out or the server stops.
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        ctx: &LinkContext,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Display connected: {}", addr);
        stream.set_nodelay(true)?;

        let mut assembler = Assembler::new();
        let mut buf = [0u8; 256];
        let mut out = BytesMut::with_capacity(bluosec_protocol::MAX_RESPONSE_FRAME_LEN);

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] Connection closed by display", addr);
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::trace!("[{}] Received {} bytes", addr, n);
                            let frames = ctx.process_bytes(&mut assembler, &buf[..n], &mut out);
                            if frames > 0 {
                                tracing::debug!("[{}] Handled {} frame(s)", addr, frames);
                            }
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                _ = tokio::time::sleep(ctx.config.idle_timeout) => {
                    tracing::debug!("[{}] Idle timeout", addr);
                    return Ok(());
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            if !out.is_empty() {
                tracing::trace!("[{}] Writing {} bytes", addr, out.len());
                stream.write_all(&out).await?;
                out.clear();
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Returns the shared engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Copy of the current configuration mirror.
    pub fn controller_config(&self) -> ControllerConfig {
        self.engine.lock().config().clone()
    }
}
