//! Lock-free generation counters.
//!
//! Generation tasks update these with atomic adds; readers take a
//! serializable snapshot whenever they like.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};

pub struct GenerationMetrics {
    // Monotonic counters
    cache_hits: AtomicU64,
    joins: AtomicU64,
    generations: AtomicU64,
    failures: AtomicU64,
    nodes_generated: AtomicU64,
    generation_ns_sum: AtomicU64,

    // Latency histogram buckets (generation duration)
    hist_under_1ms: AtomicU64,
    hist_1_10ms: AtomicU64,
    hist_10_100ms: AtomicU64,
    hist_over_100ms: AtomicU64,

    started_at: Instant,
}

impl GenerationMetrics {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            joins: AtomicU64::new(0),
            generations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            nodes_generated: AtomicU64::new(0),
            generation_ns_sum: AtomicU64::new(0),
            hist_under_1ms: AtomicU64::new(0),
            hist_1_10ms: AtomicU64::new(0),
            hist_10_100ms: AtomicU64::new(0),
            hist_over_100ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Relaxed);
    }

    pub fn record_join(&self) {
        self.joins.fetch_add(1, Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Relaxed);
    }

    /// Called once per chunk actually generated.
    pub fn record_generation(&self, nodes: u64, duration: Duration) {
        self.generations.fetch_add(1, Relaxed);
        self.nodes_generated.fetch_add(nodes, Relaxed);
        self.generation_ns_sum
            .fetch_add(duration.as_nanos() as u64, Relaxed);

        let bucket = match duration.as_millis() {
            0 => &self.hist_under_1ms,
            1..=9 => &self.hist_1_10ms,
            10..=99 => &self.hist_10_100ms,
            _ => &self.hist_over_100ms,
        };
        bucket.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self, cached_chunks: u64, pending: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            cache_hits: self.cache_hits.load(Relaxed),
            joins: self.joins.load(Relaxed),
            generations: self.generations.load(Relaxed),
            failures: self.failures.load(Relaxed),
            nodes_generated: self.nodes_generated.load(Relaxed),
            generation_ns_sum: self.generation_ns_sum.load(Relaxed),
            cached_chunks,
            pending,
            hist: [
                self.hist_under_1ms.load(Relaxed),
                self.hist_1_10ms.load(Relaxed),
                self.hist_10_100ms.load(Relaxed),
                self.hist_over_100ms.load(Relaxed),
            ],
        }
    }
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub cache_hits: u64,
    pub joins: u64,
    pub generations: u64,
    pub failures: u64,
    pub nodes_generated: u64,
    pub generation_ns_sum: u64,
    pub cached_chunks: u64,
    pub pending: u64,
    /// `[<1ms, 1-10ms, 10-100ms, >100ms]`
    pub hist: [u64; 4],
}
