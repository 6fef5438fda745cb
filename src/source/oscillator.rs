//! Two-point oscillator simulation
//!
//! Emits the positions of two points sweeping along x while oscillating in
//! y, one following cosine and the other sine. Each sample is one line:
//!
//! ```text
//! x1 y1 x2 y2
//! ```

use std::time::Duration;

use crate::error::SourceError;
use crate::hub::Sample;

use super::{Pacer, SampleSource};

/// Default tick rate: 30 samples per second
pub const DEFAULT_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// Oscillator sample source
#[derive(Debug)]
pub struct Oscillator {
    t: f64,
    step: f64,
    amplitude: f64,
    pacer: Pacer,
}

impl Oscillator {
    /// Amplitude 20, step 0.1 per tick, 30 ticks per second
    pub fn new() -> Self {
        Self {
            t: 0.0,
            step: 0.1,
            amplitude: 20.0,
            pacer: Pacer::new(DEFAULT_INTERVAL),
        }
    }

    /// Set the tick interval (zero = as fast as the consumer pulls)
    pub fn interval(mut self, interval: Duration) -> Self {
        self.pacer = Pacer::new(interval);
        self
    }

    /// Set the peak y displacement
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Set the phase advance per tick
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.pacer.period()
    }

    /// Point positions at phase `t`: `[x, cos(t) * A, x, sin(t) * A]`
    ///
    /// x sweeps `[0, 200)` and wraps around.
    pub fn positions(&self, t: f64) -> [f64; 4] {
        let x = ((t - 100.0) * 5.0).rem_euclid(200.0);
        [x, t.cos() * self.amplitude, x, t.sin() * self.amplitude]
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for Oscillator {
    async fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        self.pacer.wait().await;

        let sample = Sample::from_fields(&self.positions(self.t));
        self.t += self.step;
        Ok(Some(sample))
    }
}
