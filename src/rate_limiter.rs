use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Enforces a fixed minimum spacing between calls to the capture primitive.
///
/// The only state is the instant the last call was issued. There is no burst
/// allowance and no backoff: every call waits until `min_interval` has passed
/// since the previous one.
#[derive(Debug)]
pub struct CaptureRateLimiter {
    min_interval: Duration,
    last_issued: Option<Instant>,
}

impl CaptureRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_issued: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_issued(&self) -> Option<Instant> {
        self.last_issued
    }

    /// Delay still required at `now` before the next call may be issued.
    pub fn delay_at(&self, now: Instant) -> Duration {
        match self.last_issued {
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Suspend until a call may be issued, then stamp the issue time.
    ///
    /// The caller must issue the capture call immediately after this returns.
    /// Returns how long the caller was held back.
    pub async fn acquire(&mut self) -> Duration {
        let delay = self.delay_at(Instant::now());
        if !delay.is_zero() {
            debug!("Throttling capture for {:?}", delay);
            sleep(delay).await;
        }
        self.last_issued = Some(Instant::now());
        delay
    }
}
