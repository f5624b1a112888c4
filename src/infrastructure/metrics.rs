//! Proxy metrics.
//!
//! Counters are plain atomics; `/metrics` renders them together with the
//! cache statistics in the Prometheus text exposition format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::infrastructure::cache::CacheStats;

/// Request-level counters for the proxy.
#[derive(Debug)]
pub struct ProxyMetrics {
    requests: AtomicU64,
    failed_requests: AtomicU64,
    upstream_fetches: AtomicU64,
    coalesced_requests: AtomicU64,
    disk_recoveries: AtomicU64,
    start_time: Instant,
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyMetrics {
    /// Create new metrics collector
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            upstream_fetches: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            disk_recoveries: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a `/fill` request
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a `/fill` request that ended in an error response
    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a download from the source server
    pub fn record_upstream_fetch(&self) {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that joined an in-flight miss instead of starting one
    pub fn record_coalesced(&self) {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an artifact re-registered from disk without fetching
    pub fn record_disk_recovery(&self) {
        self.disk_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            disk_recoveries: self.disk_recoveries.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format
    #[must_use]
    pub fn export_prometheus(&self, cache: &CacheStats) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let counters: [(&str, &str, u64); 9] = [
            ("fillproxy_requests_total", "Total number of fill requests", snapshot.requests),
            (
                "fillproxy_requests_failed_total",
                "Fill requests answered with an error",
                snapshot.failed_requests,
            ),
            ("fillproxy_cache_hits_total", "Cache index hits", cache.hits),
            ("fillproxy_cache_misses_total", "Cache index misses", cache.misses),
            (
                "fillproxy_cache_insertions_total",
                "New entries added to the cache index",
                cache.insertions,
            ),
            (
                "fillproxy_cache_evictions_total",
                "Entries evicted from the cache index",
                cache.evictions,
            ),
            (
                "fillproxy_upstream_fetches_total",
                "Source images downloaded from upstream",
                snapshot.upstream_fetches,
            ),
            (
                "fillproxy_coalesced_requests_total",
                "Requests that waited on an in-flight fill",
                snapshot.coalesced_requests,
            ),
            (
                "fillproxy_disk_recoveries_total",
                "Artifacts recovered from disk without fetching",
                snapshot.disk_recoveries,
            ),
        ];

        for (name, help, value) in counters {
            write_metric(&mut out, name, help, "counter", value);
        }
        write_metric(
            &mut out,
            "fillproxy_cache_entries",
            "Current number of cache entries",
            "gauge",
            cache.len as u64,
        );
        write_metric(
            &mut out,
            "fillproxy_uptime_seconds",
            "Seconds since the process started",
            "gauge",
            self.start_time.elapsed().as_secs(),
        );

        out
    }
}

fn write_metric(out: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}

/// Point-in-time copy of [`ProxyMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Fill requests received.
    pub requests: u64,
    /// Fill requests answered with an error.
    pub failed_requests: u64,
    /// Upstream downloads.
    pub upstream_fetches: u64,
    /// Requests coalesced onto another request's fill.
    pub coalesced_requests: u64,
    /// Disk-tier recoveries.
    pub disk_recoveries: u64,
}
