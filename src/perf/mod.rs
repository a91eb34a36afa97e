//! Bounded performance metrics recording.
//!
//! [`PerformanceRecorder`] keeps the most recent request metrics in a
//! fixed-capacity ring buffer — operational visibility for a single
//! process lifetime, no external storage, memory bounded by construction.
//! Aggregations ([`PerformanceRecorder::stats`],
//! [`PerformanceRecorder::slowest_endpoints`]) run over the current
//! buffer contents.
//!
//! Slow requests (over [`SLOW_REQUEST_MS`], not served from cache) are
//! flagged at record time with a warning and a counter metric, in
//! addition to being countable later via `stats()`.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use crate::telemetry;

/// Ring buffer capacity; insertion beyond this evicts the oldest entry.
pub const MAX_METRICS: usize = 1000;

/// Duration above which a non-cached request is flagged as slow.
pub const SLOW_REQUEST_MS: u64 = 1000;

/// One observed request.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetric {
    pub endpoint: String,
    pub duration_ms: u64,
    pub cache_hit: bool,
    pub status_code: u16,
    pub observed_at: DateTime<Utc>,
}

/// Aggregate over the current buffer contents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerfStats {
    pub total_requests: usize,
    pub avg_duration_ms: u64,
    pub cache_hit_rate_percent: u64,
    pub slow_request_count: usize,
}

/// Per-endpoint mean duration, for the slowest-endpoints breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub avg_duration_ms: u64,
    pub count: usize,
}

/// Read-only diagnostics document for the performance endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub stats: PerfStats,
    pub slowest_endpoints: Vec<EndpointStats>,
    pub uptime_seconds: u64,
    /// Resident set size, when the platform exposes it.
    pub memory_rss_bytes: Option<u64>,
}

/// Fixed-capacity FIFO recorder of request metrics.
///
/// Safe under concurrent appends: eviction and insertion happen as one
/// step under the lock, so the buffer never exceeds capacity and never
/// tears.
pub struct PerformanceRecorder {
    buffer: Mutex<VecDeque<PerformanceMetric>>,
    capacity: usize,
    started_at: Instant,
}

impl PerformanceRecorder {
    /// Recorder with the default capacity of [`MAX_METRICS`].
    pub fn new() -> Self {
        Self::with_capacity(MAX_METRICS)
    }

    /// Recorder with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            started_at: Instant::now(),
        }
    }

    /// Append a metric, evicting the oldest entry past capacity.
    pub fn record(&self, metric: PerformanceMetric) {
        if metric.duration_ms > SLOW_REQUEST_MS && !metric.cache_hit {
            warn!(
                endpoint = %metric.endpoint,
                duration_ms = metric.duration_ms,
                "slow request"
            );
            metrics::counter!(telemetry::SLOW_REQUESTS_TOTAL,
                "endpoint" => metric.endpoint.clone())
            .increment(1);
        }
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "endpoint" => metric.endpoint.clone())
        .record(metric.duration_ms as f64 / 1000.0);

        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(metric);
    }

    /// Aggregate statistics over the buffer.
    pub fn stats(&self) -> PerfStats {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.is_empty() {
            return PerfStats::default();
        }

        let total = buffer.len();
        let cached = buffer.iter().filter(|m| m.cache_hit).count();
        let slow = buffer
            .iter()
            .filter(|m| m.duration_ms > SLOW_REQUEST_MS)
            .count();
        let total_duration: u64 = buffer.iter().map(|m| m.duration_ms).sum();

        PerfStats {
            total_requests: total,
            avg_duration_ms: total_duration / total as u64,
            cache_hit_rate_percent: (cached as u64 * 100) / total as u64,
            slow_request_count: slow,
        }
    }

    /// Per-endpoint mean durations, slowest first, truncated to `limit`.
    pub fn slowest_endpoints(&self, limit: usize) -> Vec<EndpointStats> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut grouped: HashMap<&str, (usize, u64)> = HashMap::new();
        for metric in buffer.iter() {
            let entry = grouped.entry(&metric.endpoint).or_default();
            entry.0 += 1;
            entry.1 += metric.duration_ms;
        }

        let mut stats: Vec<EndpointStats> = grouped
            .into_iter()
            .map(|(endpoint, (count, total))| EndpointStats {
                endpoint: endpoint.to_string(),
                avg_duration_ms: total / count as u64,
                count,
            })
            .collect();
        stats.sort_by(|a, b| b.avg_duration_ms.cmp(&a.avg_duration_ms));
        stats.truncate(limit);
        stats
    }

    /// Metrics observed within the trailing `minutes`.
    pub fn metrics_in_window(&self, minutes: i64) -> Vec<PerformanceMetric> {
        let cutoff = Utc::now() - chrono::Duration::minutes(minutes);
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer
            .iter()
            .filter(|m| m.observed_at >= cutoff)
            .cloned()
            .collect()
    }

    /// Full diagnostics document for the read-only performance endpoint.
    pub fn report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            stats: self.stats(),
            slowest_endpoints: self.slowest_endpoints(10),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            memory_rss_bytes: memory_rss_bytes(),
        }
    }
}

impl Default for PerformanceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resident set size from `/proc/self/status`, Linux only.
#[cfg(target_os = "linux")]
fn memory_rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

#[cfg(not(target_os = "linux"))]
fn memory_rss_bytes() -> Option<u64> {
    None
}
