//! Wall-clock timing of copy phases.
//!
//! The recorder reads a monotonic clock immediately before and after each
//! codec call and keeps one [`TimingSample`] per call. Buffer allocation and
//! header preparation happen outside the measured closures.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::Result;
use crate::geometry::Level;

/// What a timed codec call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Flat pixel read.
    Read,
    /// Deep sample-count read.
    CountRead,
    /// Deep sample read.
    SampleRead,
    /// Pixel or sample write, including the final flush.
    Write,
}

impl Phase {
    /// Label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::CountRead => "count read",
            Self::SampleRead => "sample read",
            Self::Write => "write",
        }
    }
}

/// One measured codec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    /// Phase of the call.
    pub phase: Phase,
    /// Level the call worked on.
    pub level: Level,
    start: Instant,
    end: Instant,
}

impl TimingSample {
    /// Clock reading before the call.
    #[inline]
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Clock reading after the call.
    #[inline]
    pub fn end(&self) -> Instant {
        self.end
    }

    /// Elapsed time, never negative.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }

    /// Elapsed time in seconds.
    #[inline]
    pub fn seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

/// Collects [`TimingSample`]s for one copy.
#[derive(Debug, Clone, Default)]
pub struct TimingRecorder {
    samples: Vec<TimingSample>,
}

impl TimingRecorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `op` between two clock readings and records the interval when it
    /// succeeds.
    pub fn time<T>(&mut self, phase: Phase, level: Level, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let value = op()?;
        let end = Instant::now();
        self.record(phase, level, start, end);
        Ok(value)
    }

    /// Records an externally measured interval.
    pub fn record(&mut self, phase: Phase, level: Level, start: Instant, end: Instant) {
        self.samples.push(TimingSample { phase, level, start, end: end.max(start) });
    }

    /// All samples, in recording order.
    #[inline]
    pub fn samples(&self) -> &[TimingSample] {
        &self.samples
    }

    /// Returns `true` if any sample of `phase` was recorded.
    pub fn has(&self, phase: Phase) -> bool {
        self.samples.iter().any(|s| s.phase == phase)
    }

    /// Summed time of `phase`.
    pub fn total(&self, phase: Phase) -> Duration {
        self.samples
            .iter()
            .filter(|s| s.phase == phase)
            .map(TimingSample::elapsed)
            .sum()
    }

    /// Summed time of `phase`, in seconds.
    pub fn seconds(&self, phase: Phase) -> f64 {
        self.total(phase).as_secs_f64()
    }

    /// Consumes the recorder.
    pub fn into_samples(self) -> Vec<TimingSample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_time_records_success() {
        let mut rec = TimingRecorder::new();
        let value = rec.time(Phase::Read, Level::FULL, || Ok(42)).unwrap();
        assert_eq!(value, 42);
        assert_eq!(rec.samples().len(), 1);

        let sample = rec.samples()[0];
        assert_eq!(sample.phase, Phase::Read);
        assert!(sample.end() >= sample.start());
        assert!(sample.seconds() >= 0.0);
    }

    #[test]
    fn test_time_skips_failure() {
        let mut rec = TimingRecorder::new();
        let result: Result<()> = rec.time(Phase::Write, Level::FULL, || Err(Error::layout_mismatch("x")));
        assert!(result.is_err());
        assert!(rec.samples().is_empty());
        assert!(!rec.has(Phase::Write));
    }

    #[test]
    fn test_totals_per_phase() {
        let mut rec = TimingRecorder::new();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(5);
        let t2 = t1 + Duration::from_millis(7);

        rec.record(Phase::Read, Level::FULL, t0, t1);
        rec.record(Phase::Read, Level::new(1, 1), t1, t2);
        rec.record(Phase::Write, Level::FULL, t2, t1);

        assert_eq!(rec.total(Phase::Read), Duration::from_millis(12));
        assert_eq!(rec.total(Phase::Write), Duration::ZERO);
        assert_eq!(rec.total(Phase::CountRead), Duration::ZERO);
        assert!(rec.has(Phase::Write));
    }
}
