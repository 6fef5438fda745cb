//! Sample sources
//!
//! A source is anything that yields samples at its own pace: a simulation
//! ticking on a timer, lines typed by an operator, or a channel fed by some
//! other part of the program. The relay pulls from it with [`pump`] and
//! hands every sample to the hub.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::SourceError;
use crate::hub::{BroadcastHub, Sample};

pub mod lines;
pub mod oscillator;
pub mod random;

pub use lines::LineSource;
pub use oscillator::Oscillator;
pub use random::RandomSource;

/// Producer of samples
///
/// `Ok(None)` means the source is exhausted; `Err` means it failed. Either
/// way the relay stops pulling from it.
pub trait SampleSource: Send {
    fn next_sample(&mut self) -> impl Future<Output = Result<Option<Sample>, SourceError>> + Send;
}

/// Push-based producers send into the channel; the relay drains it.
impl SampleSource for mpsc::Receiver<Sample> {
    async fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        Ok(self.recv().await)
    }
}

/// Drive `source` into `hub` until it is exhausted or fails
///
/// Returns the number of samples broadcast.
pub async fn pump<S: SampleSource>(source: &mut S, hub: &BroadcastHub) -> Result<u64, SourceError> {
    let mut count = 0u64;

    loop {
        match source.next_sample().await {
            Ok(Some(sample)) => {
                let report = hub.broadcast(sample).await;
                count += 1;
                tracing::trace!(
                    seq = count,
                    viewers = report.queued,
                    dropped = report.dropped,
                    "Sample broadcast"
                );
            }
            Ok(None) => {
                tracing::info!(samples = count, "Sample source exhausted");
                return Ok(count);
            }
            Err(e) => {
                tracing::error!(samples = count, error = %e, "Sample source failed");
                return Err(e);
            }
        }
    }
}

/// Fixed-rate pacing for timer-driven sources
///
/// The ticker is created on first use so sources can be built outside a
/// runtime.
#[derive(Debug)]
pub(crate) struct Pacer {
    period: Duration,
    ticker: Option<Interval>,
}

impl Pacer {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
        }
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }

    pub(crate) async fn wait(&mut self) {
        if self.period.is_zero() {
            tokio::task::yield_now().await;
            return;
        }

        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
    }
}
