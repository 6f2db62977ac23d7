use serde::Serialize;
use std::time::Instant;

/// Collects acquisition statistics for one frame source.
pub struct DiagnosticStats {
    frame_count: u64,
    failure_count: u64,
    consecutive_failures: u64,
    start_time: Instant,
    last_frame_time: Option<Instant>,
}

/// Snapshot of diagnostic stats for logging or serialisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub fps: f64,
    pub frame_count: u64,
    pub failure_count: u64,
    pub failure_rate: f64,
    pub consecutive_failures: u64,
    pub last_frame_age_ms: Option<f64>,
}

impl DiagnosticStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            start_time: Instant::now(),
            last_frame_time: None,
        }
    }

    /// Record a successfully acquired frame.
    pub fn record_frame(&mut self) {
        self.frame_count += 1;
        self.consecutive_failures = 0;
        self.last_frame_time = Some(Instant::now());
    }

    /// Record a transient read failure. Returns the current failure streak.
    pub fn record_failure(&mut self) -> u64 {
        self.failure_count += 1;
        self.consecutive_failures += 1;
        self.consecutive_failures
    }

    /// Acquired frames per second since the stats were created.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frame_count as f64 / elapsed
    }

    /// Failure rate as a percentage (0.0 - 100.0).
    pub fn failure_rate(&self) -> f64 {
        let total = self.frame_count + self.failure_count;
        if total == 0 {
            return 0.0;
        }
        (self.failure_count as f64 / total as f64) * 100.0
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            fps: self.fps(),
            frame_count: self.frame_count,
            failure_count: self.failure_count,
            failure_rate: self.failure_rate(),
            consecutive_failures: self.consecutive_failures,
            last_frame_age_ms: self
                .last_frame_time
                .map(|t| t.elapsed().as_secs_f64() * 1000.0),
        }
    }
}

impl Default for DiagnosticStats {
    fn default() -> Self {
        Self::new()
    }
}
