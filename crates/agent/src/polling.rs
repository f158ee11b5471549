use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Fixed-interval polling bounded by a wall-clock deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self { interval: Duration::from_secs(1), deadline: Duration::from_secs(50) }
    }
}

impl PollSchedule {
    pub fn from_config(config: &leadbot_core::config::AssistantConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            deadline: Duration::from_secs(config.run_deadline_secs),
        }
    }

    pub fn start(self) -> Poller {
        Poller { schedule: self, started_at: Instant::now() }
    }
}

/// Returned when the budget ran out before the awaited work finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlineExceeded;

/// One started budget. Uses tokio's clock so paused-time tests advance it.
#[derive(Clone, Copy, Debug)]
pub struct Poller {
    schedule: PollSchedule,
    started_at: Instant,
}

impl Poller {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.schedule.deadline.saturating_sub(self.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Sleeps one interval, or less when the budget is nearly spent.
    pub async fn wait(&self) {
        let pause = self.schedule.interval.min(self.remaining());
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    /// Races `future` against the remaining budget.
    pub async fn bound<F>(&self, future: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: Future,
    {
        tokio::time::timeout(self.remaining(), future).await.map_err(|_| DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DeadlineExceeded, PollSchedule};

    fn schedule() -> PollSchedule {
        PollSchedule { interval: Duration::from_secs(1), deadline: Duration::from_secs(3) }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_advances_by_interval_until_expired() {
        let poller = schedule().start();
        assert!(!poller.expired());

        poller.wait().await;
        assert_eq!(poller.elapsed(), Duration::from_secs(1));
        poller.wait().await;
        poller.wait().await;

        assert!(poller.expired());
        assert_eq!(poller.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_is_clamped_to_remaining_budget() {
        let poller =
            PollSchedule { interval: Duration::from_secs(2), deadline: Duration::from_secs(3) }
                .start();

        poller.wait().await;
        poller.wait().await;

        assert_eq!(poller.elapsed(), Duration::from_secs(3));
        assert!(poller.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn bound_cuts_off_slow_futures() {
        let poller = schedule().start();

        let fast = poller.bound(async { 7 }).await;
        assert_eq!(fast, Ok(7));

        let slow = poller.bound(tokio::time::sleep(Duration::from_secs(10))).await;
        assert_eq!(slow, Err(DeadlineExceeded));
        assert!(poller.expired());
    }
}
