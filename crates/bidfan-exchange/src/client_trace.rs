use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bidfan_common::metrics::MetricsSink;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// Per-call connection timing recorder. Transports report the phases they
/// can observe; every completed phase flows straight into the metrics sink.
#[derive(Clone)]
pub struct ClientTrace {
    metrics: Arc<dyn MetricsSink>,
    bidder: String,
    conn_start: Option<Instant>,
    dns_start: Option<Instant>,
    tls_start: Option<Instant>,
}

impl ClientTrace {
    pub fn new(metrics: Arc<dyn MetricsSink>, bidder: &str) -> Self {
        ClientTrace {
            metrics,
            bidder: bidder.to_string(),
            conn_start: None,
            dns_start: None,
            tls_start: None,
        }
    }

    /// A connection is about to be created or fetched from the idle pool.
    pub fn get_conn(&mut self) {
        self.conn_start = Some(Instant::now());
    }

    /// A connection was obtained; records wait time and the reuse flag.
    pub fn got_conn(&mut self, reused: bool) {
        if let Some(started) = self.conn_start.take() {
            self.metrics
                .record_adapter_connection(&self.bidder, reused, started.elapsed());
        }
    }

    pub fn dns_start(&mut self) {
        self.dns_start = Some(Instant::now());
    }

    pub fn dns_done(&mut self) {
        if let Some(started) = self.dns_start.take() {
            self.metrics.record_dns_time(started.elapsed());
        }
    }

    pub fn tls_handshake_start(&mut self) {
        self.tls_start = Some(Instant::now());
    }

    pub fn tls_handshake_done(&mut self) {
        if let Some(started) = self.tls_start.take() {
            self.metrics.record_tls_handshake_time(started.elapsed());
        }
    }
}

/// DNS resolver for the shared client that times every lookup into the
/// metrics sink. Resolution itself delegates to the system resolver.
pub struct TracingResolver {
    metrics: Arc<dyn MetricsSink>,
}

impl TracingResolver {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        TracingResolver { metrics }
    }
}

impl Resolve for TracingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let metrics = self.metrics.clone();
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs = resolve_host(host, metrics).await?;
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

async fn resolve_host(
    host: String,
    metrics: Arc<dyn MetricsSink>,
) -> std::io::Result<Vec<SocketAddr>> {
    let started = Instant::now();
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0)).await?.collect();
    metrics.record_dns_time(started.elapsed());
    Ok(addrs)
}

/// Shared outbound client with connection timeouts and DNS timing installed.
pub fn build_http_client(
    metrics: Arc<dyn MetricsSink>,
    connect_timeout: std::time::Duration,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .dns_resolver(Arc::new(TracingResolver::new(metrics)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidfan_common::metrics::InMemoryMetrics;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[test]
    fn test_connection_phases_flow_to_metrics() {
        let metrics = Arc::new(InMemoryMetrics::default());
        let mut trace = ClientTrace::new(metrics.clone(), "bidder-a");

        trace.get_conn();
        trace.got_conn(true);
        trace.dns_start();
        trace.dns_done();
        trace.tls_handshake_start();
        trace.tls_handshake_done();

        assert_eq!(metrics.adapter_connections.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.reused_connections.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.dns_lookups.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.tls_handshakes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unbalanced_marks_are_ignored() {
        let metrics = Arc::new(InMemoryMetrics::default());
        let mut trace = ClientTrace::new(metrics.clone(), "bidder-a");

        // Completion without a start records nothing.
        trace.got_conn(false);
        trace.dns_done();
        trace.tls_handshake_done();

        assert_eq!(metrics.adapter_connections.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.dns_lookups.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.tls_handshakes.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_resolver_times_lookups() {
        let metrics = Arc::new(InMemoryMetrics::default());
        let addrs = resolve_host("localhost".to_string(), metrics.clone()).await.unwrap();
        assert!(!addrs.is_empty());
        assert_eq!(metrics.dns_lookups.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_build_http_client() {
        let metrics = Arc::new(InMemoryMetrics::default());
        assert!(build_http_client(metrics, Duration::from_secs(3)).is_ok());
    }
}
