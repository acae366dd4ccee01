use std::fmt;
use std::time::{Duration, Instant};

use libc::{CLOCK_MONOTONIC_RAW, clock_gettime, timespec};
use once_cell::sync::Lazy;

static FALLBACK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

pub fn monotonic_ns() -> u128 {
    unsafe {
        let mut ts: timespec = std::mem::zeroed();
        if clock_gettime(CLOCK_MONOTONIC_RAW, &mut ts) == 0 {
            (ts.tv_sec as u128) * 1_000_000_000 + (ts.tv_nsec as u128)
        } else {
            // fallback, still monotonic but with its own origin
            FALLBACK_ORIGIN.elapsed().as_nanos()
        }
    }
}

/// Source of monotonic readings. Only differences between readings matter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        let ns = monotonic_ns();
        Duration::new(
            (ns / 1_000_000_000) as u64,
            (ns % 1_000_000_000) as u32,
        )
    }
}

/// The origin every stage sample of a run is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStart(Duration);

impl RunStart {
    pub fn now<C: Clock + ?Sized>(clock: &C) -> Self {
        Self(clock.now())
    }

    pub fn elapsed<C: Clock + ?Sized>(&self, clock: &C) -> Duration {
        clock.now().saturating_sub(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dial,
    Write,
    FirstByte,
    Complete,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Dial => "dial",
            Stage::Write => "write",
            Stage::FirstByte => "first_byte",
            Stage::Complete => "complete",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Stage::Dial => "Dial",
            Stage::Write => "Write request",
            Stage::FirstByte => "First byte",
            Stage::Complete => "Everything",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSample {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// Append-only record of stage boundaries, in the order they were crossed.
#[derive(Debug, Clone, Default)]
pub struct TimingTrace {
    samples: Vec<StageSample>,
}

impl TimingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.samples.push(StageSample { stage, elapsed });
    }

    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.samples
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.elapsed)
    }

    pub fn samples(&self) -> &[StageSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

pub fn as_millis_f64(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

impl fmt::Display for TimingTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time since start:")?;
        if self.samples.is_empty() {
            return writeln!(f, "  (no stage completed)");
        }
        for s in &self.samples {
            writeln!(
                f,
                "  {:<15} {:>10.3} ms",
                format!("{}:", s.stage.title()),
                as_millis_f64(s.elapsed)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Clock that only moves when told to.
    #[derive(Debug, Default)]
    pub struct ManualClock {
        nanos: AtomicU64,
    }

    impl ManualClock {
        pub fn advance(&self, by: Duration) {
            self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
        }
    }
}
