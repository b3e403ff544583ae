use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Fixed-rate clock for a room loop that reports the time actually elapsed
/// between ticks.
pub struct Ticker {
    interval: Interval,
    last: Instant,
    max_dt: f64,
}

impl Ticker {
    pub fn new(period: Duration, max_dt: f64) -> Self {
        let mut interval = interval(period);
        // A stalled loop skips the backlog rather than bursting through it.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            last: Instant::now(),
            max_dt,
        }
    }

    /// Wait for the next tick and return the elapsed seconds, or `None` when
    /// there is nothing usable to integrate.
    pub async fn tick(&mut self) -> Option<f64> {
        let now = self.interval.tick().await;
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        sanitize_dt(elapsed, self.max_dt)
    }
}

pub fn sanitize_dt(dt: f64, max_dt: f64) -> Option<f64> {
    if !dt.is_finite() || dt <= 0.0 {
        return None;
    }
    Some(dt.min(max_dt))
}
