//! Wall-clock timing of the solver updates.

use std::fmt;
use std::time::Instant;

/// Summary of the timed regions, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingProfile {
    pub average_ms: f64,
    pub max_ms: f64,
    pub min_ms: f64,
    pub counts: usize,
}

impl fmt::Display for TimingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timing profile:")?;
        writeln!(f, "  average time: {} [ms]", self.average_ms)?;
        writeln!(f, "  max time:     {} [ms]", self.max_ms)?;
        writeln!(f, "  min time:     {} [ms]", self.min_ms)?;
        write!(f, "  counts:       {}", self.counts)
    }
}

/// Accumulates the durations between `tick` and `tock`.
#[derive(Debug, Default)]
pub struct Timer {
    started: Option<Instant>,
    total_ms: f64,
    max_ms: f64,
    min_ms: f64,
    counts: usize,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Records the time elapsed since the last `tick`. A `tock` without `tick` is ignored.
    pub fn tock(&mut self) {
        let Some(start) = self.started.take() else {
            return;
        };
        let ms = start.elapsed().as_secs_f64() * 1e3;
        self.total_ms += ms;
        if self.counts == 0 {
            self.max_ms = ms;
            self.min_ms = ms;
        } else {
            self.max_ms = self.max_ms.max(ms);
            self.min_ms = self.min_ms.min(ms);
        }
        self.counts += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn profile(&self) -> TimingProfile {
        if self.counts == 0 {
            return TimingProfile::default();
        }
        TimingProfile {
            average_ms: self.total_ms / self.counts as f64,
            max_ms: self.max_ms,
            min_ms: self.min_ms,
            counts: self.counts,
        }
    }
}
