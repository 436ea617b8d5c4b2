//! Metrics collection and export for Parlor.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use async_trait::async_trait;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use parlor_core::HubHandle;
use parlor_protocol::{ChatFrame, ClientFrame};
use parlor_transport::{FrameSink, FrameSource, TransportError};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "parlor_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "parlor_connections_active";
    pub const MESSAGES_TOTAL: &str = "parlor_messages_total";
    pub const MESSAGES_BYTES: &str = "parlor_messages_bytes";
    pub const ROOM_MEMBERS: &str = "parlor_room_members";
    pub const ROOM_PUBLISHED: &str = "parlor_room_published_total";
    pub const ROOM_EVICTIONS: &str = "parlor_room_evictions_total";
    pub const REJECTIONS_TOTAL: &str = "parlor_rejections_total";
    pub const ERRORS_TOTAL: &str = "parlor_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    // Describe metrics
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Total number of messages processed");
    metrics::describe_counter!(names::MESSAGES_BYTES, "Total bytes of message bodies processed");
    metrics::describe_gauge!(names::ROOM_MEMBERS, "Current number of room members");
    metrics::describe_counter!(names::ROOM_PUBLISHED, "Messages fanned out by the room");
    metrics::describe_counter!(
        names::ROOM_EVICTIONS,
        "Members evicted for falling behind"
    );
    metrics::describe_counter!(
        names::REJECTIONS_TOTAL,
        "Connection attempts rejected before joining"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a message.
pub fn record_message(bytes: usize, direction: &'static str) {
    counter!(names::MESSAGES_TOTAL, "direction" => direction).increment(1);
    counter!(names::MESSAGES_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record a connection rejected before joining the room.
pub fn record_rejection(reason: &'static str) {
    counter!(names::REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Periodically copy hub statistics into gauges and counters.
///
/// The task ends when the hub stops.
pub fn spawn_hub_sampler(hub: HubHandle, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Ok(stats) = hub.stats().await else {
                debug!("Hub closed, stopping sampler");
                return;
            };
            gauge!(names::ROOM_MEMBERS).set(stats.members as f64);
            counter!(names::ROOM_PUBLISHED).absolute(stats.published);
            counter!(names::ROOM_EVICTIONS).absolute(stats.evicted);
        }
    })
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}

/// Counts frames passing through a connection half.
pub struct Metered<T>(pub T);

#[async_trait]
impl<T: FrameSource> FrameSource for Metered<T> {
    async fn recv(&mut self) -> Result<Option<ClientFrame>, TransportError> {
        let result = self.0.recv().await;
        match &result {
            Ok(Some(frame)) => record_message(frame.message.len(), "inbound"),
            Ok(None) => {}
            Err(e) if e.is_recoverable() => record_error("decode"),
            Err(_) => record_error("receive"),
        }
        result
    }
}

#[async_trait]
impl<T: FrameSink> FrameSink for Metered<T> {
    async fn send(&mut self, frame: &ChatFrame) -> Result<(), TransportError> {
        let result = self.0.send(frame).await;
        match &result {
            Ok(()) => record_message(frame.message.len(), "outbound"),
            Err(_) => record_error("send"),
        }
        result
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_core::{trace, Hub, HubConfig};
    use parlor_transport::memory::duplex;

    #[test]
    fn test_metrics_guard() {
        // Just test that it doesn't panic
        let _guard = ConnectionMetricsGuard::new();
    }

    #[tokio::test]
    async fn test_metered_halves_pass_frames_through() {
        let (source, sink, mut peer) = duplex(4);
        let (mut source, mut sink) = (Metered(source), Metered(sink));

        peer.send("in").await.unwrap();
        assert_eq!(source.recv().await.unwrap().unwrap().message, "in");

        sink.send(&ChatFrame::new("alice", "out", "")).await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(peer.recv().await.unwrap().message, "out");
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn test_sampler_stops_with_hub() {
        let hub = Hub::spawn(HubConfig::default(), trace::off());
        let sampler = spawn_hub_sampler(hub.clone(), Duration::from_millis(1));

        hub.shutdown();
        tokio::time::timeout(Duration::from_secs(5), sampler)
            .await
            .unwrap()
            .unwrap();
    }
}
