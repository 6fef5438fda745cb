//! Random integer source
//!
//! Emits a uniformly random integer in a fixed range on a timer. Handy for
//! checking that viewers are wired up before a real simulation exists.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SourceError;
use crate::hub::Sample;

use super::{Pacer, SampleSource};

/// Default tick rate: 5 samples per second
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Random value source
#[derive(Debug)]
pub struct RandomSource {
    rng: StdRng,
    range: RangeInclusive<i64>,
    pacer: Pacer,
}

impl RandomSource {
    /// Values in `[-100, 100]`, five per second
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic sequence for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            range: -100..=100,
            pacer: Pacer::new(DEFAULT_INTERVAL),
        }
    }

    /// Set the value range (an empty range collapses to its start)
    pub fn range(mut self, range: RangeInclusive<i64>) -> Self {
        self.range = if range.is_empty() {
            *range.start()..=*range.start()
        } else {
            range
        };
        self
    }

    /// Set the tick interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.pacer = Pacer::new(interval);
        self
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for RandomSource {
    async fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        self.pacer.wait().await;

        let value = self.rng.gen_range(self.range.clone());
        Ok(Some(Sample::text(value.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn values(source: &mut RandomSource, n: usize) -> Vec<i64> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let sample = source.next_sample().await.unwrap().unwrap();
            out.push(sample.as_text().and_then(|t| t.parse().ok()).unwrap());
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_values_within_range() {
        let mut source = RandomSource::seeded(7);
        for v in values(&mut source, 200).await {
            assert!((-100..=100).contains(&v));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_is_deterministic() {
        let mut a = RandomSource::seeded(42);
        let mut b = RandomSource::seeded(42);

        assert_eq!(values(&mut a, 20).await, values(&mut b, 20).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_range() {
        let mut source = RandomSource::seeded(1)
            .range(3..=3)
            .interval(Duration::from_millis(10));
        assert_eq!(values(&mut source, 5).await, vec![3; 5]);

        #[allow(clippy::reversed_empty_ranges)]
        let mut empty = RandomSource::seeded(1).range(9..=1);
        assert_eq!(values(&mut empty, 2).await, vec![9, 9]);
    }
}
