use std::time::Instant;

use backoff::{Clock, exponential::ExponentialBackoff};
use gha_annotations_core::config::RetryConfig;

pub const RANDOMIZATION_FACTOR: f64 = 0.5;
pub const MULTIPLIER: f64 = 1.5;

/// Reads time from tokio, so paused test clocks also drive the elapsed-time budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant { tokio::time::Instant::now().into_std() }
}

pub type Backoff = ExponentialBackoff<TokioClock>;

/// Exponential backoff with jitter, starting now. A zero `max_elapsed_time` retries forever.
pub fn exponential_backoff(config: &RetryConfig) -> Backoff {
    let clock = TokioClock;
    ExponentialBackoff {
        current_interval: config.initial_interval,
        initial_interval: config.initial_interval,
        randomization_factor: RANDOMIZATION_FACTOR,
        multiplier: MULTIPLIER,
        max_interval: config.max_interval,
        start_time: clock.now(),
        max_elapsed_time: Some(config.max_elapsed_time).filter(|d| !d.is_zero()),
        clock,
    }
}
