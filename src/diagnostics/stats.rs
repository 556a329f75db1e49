use serde::Serialize;
use std::time::Instant;

/// Collects diagnostic statistics for a capture session.
pub struct DiagnosticStats {
    frame_count: u64,
    empty_count: u64,
    failure_count: u64,
    skipped_ticks: u64,
    total_bytes: u64,
    start_time: Instant,
    last_frame_time: Option<Instant>,
    last_tick_us: u64,
}

/// Snapshot of diagnostic stats for logging and serialisation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub fps: f64,
    pub frame_count: u64,
    pub empty_count: u64,
    pub failure_count: u64,
    pub skipped_ticks: u64,
    pub drop_rate: f64,
    pub tick_ms: f64,
    pub bandwidth_bps: u64,
    /// Milliseconds since the latest published frame, if any.
    pub last_frame_age_ms: Option<f64>,
}

impl DiagnosticStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            empty_count: 0,
            failure_count: 0,
            skipped_ticks: 0,
            total_bytes: 0,
            start_time: Instant::now(),
            last_frame_time: None,
            last_tick_us: 0,
        }
    }

    /// Record a frame published to the display sink.
    pub fn record_frame(&mut self, bytes: usize) {
        self.frame_count += 1;
        self.total_bytes += bytes as u64;
        self.last_frame_time = Some(Instant::now());
    }

    /// Record a tick whose read returned no data.
    pub fn record_empty(&mut self) {
        self.empty_count += 1;
    }

    /// Record a tick that failed (read, processing, conversion or panic).
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    /// Record fires dropped because a tick overran.
    pub fn record_skipped(&mut self, ticks: u64) {
        self.skipped_ticks += ticks;
    }

    /// Record how long the last tick took, in microseconds.
    pub fn record_tick_duration(&mut self, micros: u64) {
        self.last_tick_us = micros;
    }

    /// Calculate published FPS based on elapsed time.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frame_count as f64 / elapsed
    }

    /// Share of ticks that did not publish a frame, as a percentage
    /// (0.0 - 100.0).
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.empty_count + self.failure_count;
        let total = self.frame_count + dropped;
        if total == 0 {
            return 0.0;
        }
        (dropped as f64 / total as f64) * 100.0
    }

    /// Duration of the latest tick in milliseconds.
    pub fn tick_ms(&self) -> f64 {
        self.last_tick_us as f64 / 1000.0
    }

    /// Bandwidth in bytes per second.
    pub fn bandwidth_bps(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.total_bytes as f64 / elapsed) as u64
    }

    /// Time since the latest frame was published, in milliseconds.
    pub fn last_frame_age_ms(&self) -> Option<f64> {
        self.last_frame_time
            .map(|at| at.elapsed().as_secs_f64() * 1000.0)
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            fps: self.fps(),
            frame_count: self.frame_count,
            empty_count: self.empty_count,
            failure_count: self.failure_count,
            skipped_ticks: self.skipped_ticks,
            drop_rate: self.drop_rate(),
            tick_ms: self.tick_ms(),
            bandwidth_bps: self.bandwidth_bps(),
            last_frame_age_ms: self.last_frame_age_ms(),
        }
    }
}

impl Default for DiagnosticStats {
    fn default() -> Self {
        Self::new()
    }
}
