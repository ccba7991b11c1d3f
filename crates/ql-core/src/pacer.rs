//! Minimum spacing between provider calls.

use std::thread;
use std::time::{Duration, Instant};

/// Blocks so that consecutive calls are at least `interval` apart.
///
/// The first call never waits. A zero interval disables pacing.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Pacing from a seconds value; non-finite or negative values disable it.
    pub fn from_secs_f64(secs: f64) -> Self {
        let interval = if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        };
        Self::new(interval)
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait out the remainder of the interval, then mark a call as issued.
    pub fn wait(&mut self) {
        if self.interval.is_zero() {
            return;
        }
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}
