//! Prometheus metrics for the link service.
//!
//! This module provides:
//! - Metrics registry with counters, gauges, and histograms
//! - HTTP server to expose metrics at `/metrics` endpoint

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Frame handling duration buckets (in seconds).
const DURATION_BUCKETS: &[f64] = &[0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05];

/// Prometheus metrics for the link service.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Total links accepted.
    pub connections_total: Counter,
    /// Currently open links.
    pub connections_active: Gauge,
    /// Request frames by outcome.
    pub frames_total: CounterVec,
    /// Request frames whose LRC did not match.
    pub checksum_errors_total: Counter,
    /// Bytes dropped by full receive queues.
    pub dropped_bytes_total: Counter,
    /// Configuration writes by result.
    pub config_writes_total: CounterVec,
    /// Bytes written to the EEPROM image.
    pub eeprom_writes_total: Counter,
    /// Signals raised by the engine.
    pub signals_total: CounterVec,
    /// Frame handling duration by outcome.
    pub frame_duration: HistogramVec,
}

impl Metrics {
    /// Creates a new Metrics instance with all metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Links
        let connections_total = Counter::with_opts(Opts::new(
            "bluosec_connections_total",
            "Total number of links accepted",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let connections_active = Gauge::with_opts(Opts::new(
            "bluosec_connections_active",
            "Number of currently open links",
        ))?;
        registry.register(Box::new(connections_active.clone()))?;

        // Frames
        let frames_total = CounterVec::new(
            Opts::new("bluosec_frames_total", "Total request frames by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(frames_total.clone()))?;

        let checksum_errors_total = Counter::with_opts(Opts::new(
            "bluosec_checksum_errors_total",
            "Request frames answered with a checksum error echo",
        ))?;
        registry.register(Box::new(checksum_errors_total.clone()))?;

        let dropped_bytes_total = Counter::with_opts(Opts::new(
            "bluosec_dropped_bytes_total",
            "Bytes dropped because the receive queue was full",
        ))?;
        registry.register(Box::new(dropped_bytes_total.clone()))?;

        // Writes
        let config_writes_total = CounterVec::new(
            Opts::new(
                "bluosec_config_writes_total",
                "Configuration writes by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(config_writes_total.clone()))?;

        let eeprom_writes_total = Counter::with_opts(Opts::new(
            "bluosec_eeprom_writes_total",
            "Bytes written to the EEPROM image",
        ))?;
        registry.register(Box::new(eeprom_writes_total.clone()))?;

        let signals_total = CounterVec::new(
            Opts::new("bluosec_signals_total", "Signals raised by the engine"),
            &["signal"],
        )?;
        registry.register(Box::new(signals_total.clone()))?;

        let frame_duration = HistogramVec::new(
            HistogramOpts::new(
                "bluosec_frame_duration_seconds",
                "Frame handling duration in seconds by outcome",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        registry.register(Box::new(frame_duration.clone()))?;

        Ok(Self {
            registry,
            connections_total,
            connections_active,
            frames_total,
            checksum_errors_total,
            dropped_bytes_total,
            config_writes_total,
            eeprom_writes_total,
            signals_total,
            frame_duration,
        })
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        buffer
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Runs the HTTP metrics server.
///
/// The server listens on the given address and serves metrics at `/metrics`.
pub async fn run_metrics_server(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                async move { handle_request(req, metrics).await }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                tracing::debug!("Metrics connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Metrics server accept error: {}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Metrics server shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn respond(
    status: StatusCode,
    content_type: Option<&str>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Some(value) = content_type.and_then(|v| v.parse().ok()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}

/// Handles an HTTP request to the metrics server.
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match req.uri().path() {
        "/metrics" => respond(
            StatusCode::OK,
            Some("text/plain; version=0.0.4; charset=utf-8"),
            metrics.encode(),
        ),
        "/health" | "/healthz" => respond(StatusCode::OK, None, "OK"),
        "/" => respond(
            StatusCode::OK,
            Some("text/html"),
            r#"<!DOCTYPE html>
<html>
<head><title>bluosec Metrics</title></head>
<body>
<h1>bluosec Metrics</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>"#,
        ),
        _ => respond(StatusCode::NOT_FOUND, None, "Not Found"),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();

        metrics.connections_total.inc();
        metrics.connections_active.inc();
        metrics.frames_total.with_label_values(&["telemetry"]).inc();
        metrics.checksum_errors_total.inc();
        metrics
            .config_writes_total
            .with_label_values(&["persisted"])
            .inc();
        metrics
            .signals_total
            .with_label_values(&["speed_limit_changed"])
            .inc();
        metrics
            .frame_duration
            .with_label_values(&["telemetry"])
            .observe(0.0001);

        let encoded = String::from_utf8(metrics.encode()).unwrap();

        assert!(encoded.contains("bluosec_connections_total"));
        assert!(encoded.contains("bluosec_connections_active"));
        assert!(encoded.contains("bluosec_frames_total"));
        assert!(encoded.contains("bluosec_checksum_errors_total 1"));
        assert!(encoded.contains("bluosec_config_writes_total"));
        assert!(encoded.contains("bluosec_signals_total"));
        assert!(encoded.contains("bluosec_frame_duration_seconds"));
    }

    #[test]
    fn test_dropped_bytes() {
        let metrics = Metrics::new().unwrap();
        metrics.dropped_bytes_total.inc_by(3.0);
        let encoded = String::from_utf8(metrics.encode()).unwrap();
        assert!(encoded.contains("bluosec_dropped_bytes_total 3"));
        metrics.eeprom_writes_total.inc_by(2.0);
        let encoded = String::from_utf8(metrics.encode()).unwrap();
        assert!(encoded.contains("bluosec_eeprom_writes_total 2"));
    }

    #[tokio::test]
    async fn test_metrics_server_serves_and_stops() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.connections_total.inc();
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_metrics_server(addr, metrics, rx));

        let mut stream = None;
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        }
        let mut stream = stream.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();
        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains("bluosec_connections_total 1"));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
