use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

/// Contract between the engine and the host's metrics pipeline. Every method
/// has a no-op default so sinks only implement what they export.
pub trait MetricsSink: Send + Sync {
    /// A connection was obtained for an outbound adapter call.
    fn record_adapter_connection(&self, _bidder: &str, _reused: bool, _wait: Duration) {}

    fn record_dns_time(&self, _lookup: Duration) {}

    fn record_tls_handshake_time(&self, _handshake: Duration) {}

    fn record_ads_cert_sign_time(&self, _elapsed: Duration) {}

    fn record_ads_cert_request(&self, _success: bool) {}

    fn record_timeout_notice(&self, _success: bool) {}

    /// One hook invocation finished with the given terminal status.
    fn record_hook_execution(&self, _module: &str, _stage: &str, _status: &str, _elapsed: Duration) {}
}

/// Sink that drops every measurement.
#[derive(Debug, Default)]
pub struct NilMetrics;

impl MetricsSink for NilMetrics {}

/// Atomic-counter sink for tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    pub adapter_connections: AtomicU64,
    pub reused_connections: AtomicU64,
    pub dns_lookups: AtomicU64,
    pub tls_handshakes: AtomicU64,
    pub ads_cert_sign_success: AtomicU64,
    pub ads_cert_sign_failure: AtomicU64,
    pub timeout_notice_success: AtomicU64,
    pub timeout_notice_failure: AtomicU64,
    /// Hook invocation counts keyed `module/stage/status`.
    pub hook_invocations: DashMap<String, u64>,
}

impl MetricsSink for InMemoryMetrics {
    fn record_adapter_connection(&self, _bidder: &str, reused: bool, _wait: Duration) {
        self.adapter_connections.fetch_add(1, Ordering::Relaxed);
        if reused {
            self.reused_connections.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_dns_time(&self, _lookup: Duration) {
        self.dns_lookups.fetch_add(1, Ordering::Relaxed);
    }

    fn record_tls_handshake_time(&self, _handshake: Duration) {
        self.tls_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ads_cert_request(&self, success: bool) {
        if success {
            self.ads_cert_sign_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ads_cert_sign_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_timeout_notice(&self, success: bool) {
        if success {
            self.timeout_notice_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.timeout_notice_failure.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_hook_execution(&self, module: &str, stage: &str, status: &str, _elapsed: Duration) {
        *self
            .hook_invocations
            .entry(format!("{module}/{stage}/{status}"))
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_counts() {
        let m = InMemoryMetrics::default();
        m.record_adapter_connection("bidder-a", true, Duration::from_millis(2));
        m.record_adapter_connection("bidder-a", false, Duration::from_millis(1));
        m.record_timeout_notice(false);
        m.record_hook_execution("acme.foobar", "entrypoint", "success", Duration::ZERO);
        m.record_hook_execution("acme.foobar", "entrypoint", "success", Duration::ZERO);

        assert_eq!(m.adapter_connections.load(Ordering::Relaxed), 2);
        assert_eq!(m.reused_connections.load(Ordering::Relaxed), 1);
        assert_eq!(m.timeout_notice_failure.load(Ordering::Relaxed), 1);
        assert_eq!(
            *m.hook_invocations.get("acme.foobar/entrypoint/success").unwrap(),
            2
        );
    }
}
