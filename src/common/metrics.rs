//! Coordinator metrics
//!
//! Prometheus-compatible counters, gauges and an allocation latency
//! histogram. One `CoordinatorMetrics` is owned by each coordinator.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    /// Create a histogram with custom bucket boundaries
    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // Stored as microseconds for precision
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative `(le, count)` pairs, ending with `+Inf`
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time value
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Everything the coordinator counts
#[derive(Debug)]
pub struct CoordinatorMetrics {
    pub registrations: Counter,
    pub heartbeats: Counter,
    pub unknown_heartbeats: Counter,
    pub allocations: Counter,
    pub degraded_allocations: Counter,
    pub blocks_allocated: Counter,
    pub files_removed: Counter,
    pub persistence_failures: Counter,
    pub allocation_latency: Histogram,

    pub workers: Gauge,
    pub active_workers: Gauge,
    pub files: Gauge,

    start_time: Instant,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self {
            registrations: Counter::new(),
            heartbeats: Counter::new(),
            unknown_heartbeats: Counter::new(),
            allocations: Counter::new(),
            degraded_allocations: Counter::new(),
            blocks_allocated: Counter::new(),
            files_removed: Counter::new(),
            persistence_failures: Counter::new(),
            allocation_latency: Histogram::new(),
            workers: Gauge::new(),
            active_workers: Gauge::new(),
            files: Gauge::new(),
            start_time: Instant::now(),
        }
    }

    pub fn observe_allocation(&self, elapsed: Duration) {
        self.allocation_latency
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let counters = [
            ("minidfs_registrations_total", "Worker registrations", &self.registrations),
            ("minidfs_heartbeats_total", "Heartbeats from known workers", &self.heartbeats),
            (
                "minidfs_unknown_heartbeats_total",
                "Heartbeats from unregistered workers",
                &self.unknown_heartbeats,
            ),
            ("minidfs_allocations_total", "Successful allocations", &self.allocations),
            (
                "minidfs_degraded_allocations_total",
                "Allocations with fewer replicas than the replication factor",
                &self.degraded_allocations,
            ),
            ("minidfs_blocks_allocated_total", "Blocks handed out", &self.blocks_allocated),
            ("minidfs_files_removed_total", "File records removed", &self.files_removed),
            (
                "minidfs_persistence_failures_total",
                "Failed metadata snapshot rewrites",
                &self.persistence_failures,
            ),
        ];
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        let gauges = [
            ("minidfs_workers", "Registered workers", &self.workers),
            ("minidfs_active_workers", "Workers currently active", &self.active_workers),
            ("minidfs_files", "Files in the metadata store", &self.files),
        ];
        for (name, help, gauge) in gauges {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} gauge", name);
            let _ = writeln!(out, "{} {}", name, gauge.get());
        }

        out.push_str("# HELP minidfs_uptime_seconds Coordinator uptime in seconds\n");
        out.push_str("# TYPE minidfs_uptime_seconds gauge\n");
        let _ = writeln!(out, "minidfs_uptime_seconds {}", self.uptime_seconds());

        out.push_str("# HELP minidfs_allocation_duration_ms Allocation latency in milliseconds\n");
        out.push_str("# TYPE minidfs_allocation_duration_ms histogram\n");
        for (le, count) in self.allocation_latency.get_buckets() {
            if le.is_infinite() {
                let _ = writeln!(
                    out,
                    "minidfs_allocation_duration_ms_bucket{{le=\"+Inf\"}} {}",
                    count
                );
            } else {
                let _ = writeln!(
                    out,
                    "minidfs_allocation_duration_ms_bucket{{le=\"{}\"}} {}",
                    le, count
                );
            }
        }
        let _ = writeln!(
            out,
            "minidfs_allocation_duration_ms_sum {}",
            self.allocation_latency.sum()
        );
        let _ = writeln!(
            out,
            "minidfs_allocation_duration_ms_count {}",
            self.allocation_latency.count()
        );

        out
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}
