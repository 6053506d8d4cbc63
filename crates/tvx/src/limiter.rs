//! ⏱️ The launch-rate limiter: a metronome for outgoing requests.
//!
//! 🎬 *[a conductor raises the baton. the orchestra is 4,000 HTTP requests.]*
//! *["one... and two... and" the violins try to rush. the baton does not allow it.]*
//!
//! 🧠 Knowledge graph:
//! - Only the launcher calls [`RateLimiter::wait`]. Workers never see it.
//! - What gets throttled is the cadence of *launching* workers, not how long they run.
//! - No burst allowance: consecutive waits are at least one period apart.
//! - It never errors. It only makes you wait. Like the DMV, but with guarantees. 🦆

use std::time::Duration;

use anyhow::{Result, bail};
use tokio::time::{Interval, MissedTickBehavior, interval};

/// ⏱️ Evenly spaced ticks, one per `1/rate`.
///
/// The first `wait` returns immediately; every following `wait` returns no
/// sooner than one period after the previous one returned. If the caller shows
/// up late, the next tick is pushed back instead of firing twice to catch up.
#[derive(Debug)]
pub struct RateLimiter {
    ticker: Interval,
    period: Duration,
}

/// 🏎️ One launch per microsecond. Past this the period rounds down to zero.
pub const MAX_REQUESTS_PER_SECOND: u32 = 1_000_000;

impl RateLimiter {
    /// 🏗️ A limiter that allows `requests_per_second` launches per second.
    pub fn per_second(requests_per_second: u32) -> Result<Self> {
        if requests_per_second == 0 {
            // 💀 zero per second is not a rate, it's a strike
            bail!("💀 requests_per_second must be at least 1: a rate of zero means nothing ever launches");
        }
        if requests_per_second > MAX_REQUESTS_PER_SECOND {
            bail!(
                "💀 requests_per_second must be at most {MAX_REQUESTS_PER_SECOND}, got {requests_per_second}"
            );
        }
        Ok(Self::every(Duration::from_secs(1) / requests_per_second))
    }

    /// 🏗️ A limiter with an explicit period between ticks. Period must be non-zero.
    pub fn every(period: Duration) -> Self {
        let mut ticker = interval(period);
        // 🔧 Delay, not Burst: a late caller must not earn a flurry of instant ticks
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 🚦 Block until the next launch slot opens.
    pub async fn wait(&mut self) {
        self.ticker.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn the_one_where_launches_are_spaced_like_a_metronome() {
        let mut limiter = RateLimiter::per_second(10).expect("💀 10/s is a perfectly fine rate");
        assert_eq!(limiter.period(), Duration::from_millis(100));

        let mut the_launch_times = Vec::new();
        for _ in 0..6 {
            limiter.wait().await;
            the_launch_times.push(Instant::now());
        }

        for pair in the_launch_times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(100),
                "launches bunched up: gap was {gap:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_first_wait_is_free() {
        let mut limiter = RateLimiter::every(Duration::from_secs(5));
        let before = Instant::now();
        limiter.wait().await;
        assert_eq!(Instant::now() - before, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_late_caller_does_not_get_a_burst() {
        let mut limiter = RateLimiter::every(Duration::from_millis(100));
        limiter.wait().await;

        // 💤 dawdle for three whole periods
        tokio::time::sleep(Duration::from_millis(350)).await;
        limiter.wait().await;
        let after_late_wait = Instant::now();

        // ✅ the next tick still honours a full period from the late one
        limiter.wait().await;
        assert!(Instant::now() - after_late_wait >= Duration::from_millis(100));
    }

    #[test]
    fn the_one_where_zero_per_second_is_rejected() {
        assert!(RateLimiter::per_second(0).is_err());
    }

    #[tokio::test]
    async fn the_one_where_a_rate_too_fast_to_measure_is_refused_not_panicked() {
        assert!(RateLimiter::per_second(2_000_000_000).is_err());
        assert!(RateLimiter::per_second(MAX_REQUESTS_PER_SECOND + 1).is_err());

        let fastest = RateLimiter::per_second(MAX_REQUESTS_PER_SECOND)
            .expect("💀 the ceiling itself is allowed");
        assert_eq!(fastest.period(), Duration::from_micros(1));
    }
}
