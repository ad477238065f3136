//! Application metrics collection and reporting.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

/// Metrics collector for the tile API.
///
/// Counters are kept locally for the JSON API and mirrored to the
/// `metrics` recorder for Prometheus.
#[derive(Debug)]
pub struct MetricsCollector {
    /// Request counts
    pub tile_requests: AtomicU64,
    pub cutout_requests: AtomicU64,

    /// Cache outcomes
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub not_modified: AtomicU64,
    pub blank_tiles: AtomicU64,

    /// Render stats
    pub renders_total: AtomicU64,
    pub render_errors: AtomicU64,
    pub partial_renders: AtomicU64,

    /// Per-source outcomes: (source, band) pairs that contributed pixels
    pub source_contributions: AtomicU64,
    pub source_skips: AtomicU64,

    /// Timing stats (stored as microseconds)
    render_times: RwLock<TimingStats>,
    layer_times: RwLock<HashMap<String, TimingStats>>,

    /// Start time for uptime calculation
    start_time: Instant,
}

#[derive(Debug, Default, Clone, Copy)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }

    fn stats(&self) -> RenderStats {
        RenderStats {
            count: self.count,
            avg_ms: self.avg_ms(),
            min_ms: self.min_us as f64 / 1000.0,
            max_ms: self.max_us as f64 / 1000.0,
            last_ms: self.last_us as f64 / 1000.0,
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tile_requests: AtomicU64::new(0),
            cutout_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            not_modified: AtomicU64::new(0),
            blank_tiles: AtomicU64::new(0),
            renders_total: AtomicU64::new(0),
            render_errors: AtomicU64::new(0),
            partial_renders: AtomicU64::new(0),
            source_contributions: AtomicU64::new(0),
            source_skips: AtomicU64::new(0),
            render_times: RwLock::new(TimingStats::default()),
            layer_times: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_tile_request(&self) {
        self.tile_requests.fetch_add(1, Ordering::Relaxed);
        counter!("tile_requests_total").increment(1);
    }

    pub fn record_cutout(&self) {
        self.cutout_requests.fetch_add(1, Ordering::Relaxed);
        counter!("cutout_requests_total").increment(1);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("tile_cache_hits_total").increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("tile_cache_misses_total").increment(1);
    }

    pub fn record_not_modified(&self) {
        self.not_modified.fetch_add(1, Ordering::Relaxed);
        counter!("tile_not_modified_total").increment(1);
    }

    pub fn record_blank(&self) {
        self.blank_tiles.fetch_add(1, Ordering::Relaxed);
        counter!("tile_blank_total").increment(1);
    }

    /// Record per-source outcomes of one build.
    pub fn record_sources(&self, contributed: u64, skipped: u64) {
        self.source_contributions.fetch_add(contributed, Ordering::Relaxed);
        self.source_skips.fetch_add(skipped, Ordering::Relaxed);
        counter!("source_contributions_total").increment(contributed);
        counter!("source_skips_total").increment(skipped);
    }

    /// Record a finished render attempt.
    pub async fn record_render(&self, layer: &str, duration_us: u64, success: bool, partial: bool) {
        self.renders_total.fetch_add(1, Ordering::Relaxed);
        counter!("renders_total").increment(1);
        if !success {
            self.render_errors.fetch_add(1, Ordering::Relaxed);
            counter!("render_errors_total").increment(1);
        }
        if partial {
            self.partial_renders.fetch_add(1, Ordering::Relaxed);
            counter!("partial_renders_total").increment(1);
        }

        histogram!("render_duration_ms").record(duration_us as f64 / 1000.0);
        histogram!("render_duration_by_layer_ms", "layer" => layer.to_string())
            .record(duration_us as f64 / 1000.0);

        self.render_times.write().await.record(duration_us);
        self.layer_times
            .write()
            .await
            .entry(layer.to_string())
            .or_default()
            .record(duration_us);
    }

    /// Get current metrics snapshot
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let render_times = *self.render_times.read().await;
        let layer_times = self.layer_times.read().await;

        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            (cache_hits as f64 / cache_total as f64) * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            tile_requests: self.tile_requests.load(Ordering::Relaxed),
            cutout_requests: self.cutout_requests.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            not_modified: self.not_modified.load(Ordering::Relaxed),
            blank_tiles: self.blank_tiles.load(Ordering::Relaxed),
            renders_total: self.renders_total.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
            partial_renders: self.partial_renders.load(Ordering::Relaxed),
            source_contributions: self.source_contributions.load(Ordering::Relaxed),
            source_file_reads: 0,
            source_skips: self.source_skips.load(Ordering::Relaxed),
            render: render_times.stats(),
            layers: layer_times.iter().map(|(k, v)| (k.clone(), v.stats())).collect(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics for JSON serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,

    pub tile_requests: u64,
    pub cutout_requests: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub not_modified: u64,
    pub blank_tiles: u64,

    pub renders_total: u64,
    pub render_errors: u64,
    pub partial_renders: u64,

    pub source_contributions: u64,
    pub source_skips: u64,
    /// Source and pyramid files opened; filled in from the shared reader.
    pub source_file_reads: u64,

    pub render: RenderStats,
    pub layers: HashMap<String, RenderStats>,
}

/// Render timing statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderStats {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}
