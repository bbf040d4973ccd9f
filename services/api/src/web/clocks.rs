//! services/api/src/web/clocks.rs
//!
//! The one-second clocks that drive a live session. Each clock is its own task
//! that sends a tick over a channel until its `CancellationToken` is cancelled.
//! The clocks never touch the session themselves.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Elapsed session time. Runs for the whole session.
    Mission,
    /// The rest countdown. Runs only while resting; `epoch` tells a restarted
    /// countdown apart from ticks still queued by the one it replaced.
    Rest { epoch: u64 },
}

/// Starts a clock. The first tick arrives one period after the call. Ticks
/// missed while the receiver lags are delivered back to back, so the count of
/// ticks always matches the wall time that passed.
pub fn spawn_clock(
    clock: Clock,
    ticks: mpsc::Sender<Clock>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(?clock, "Clock cancelled.");
                    return;
                }
                _ = interval.tick() => {
                    if ticks.send(clock).await.is_err() {
                        debug!(?clock, "Session gone, stopping clock.");
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_second() {
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handle = spawn_clock(Clock::Rest { epoch: 1 }, tx, token.clone());

        let started = Instant::now();
        assert_eq!(rx.recv().await, Some(Clock::Rest { epoch: 1 }));
        assert!(started.elapsed() >= TICK_PERIOD && started.elapsed() < TICK_PERIOD * 2);
        assert_eq!(rx.recv().await, Some(Clock::Rest { epoch: 1 }));
        assert!(started.elapsed() >= TICK_PERIOD * 2 && started.elapsed() < TICK_PERIOD * 3);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagging_receiver_gets_every_missed_tick() {
        let (tx, mut rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let handle = spawn_clock(Clock::Mission, tx, token.clone());

        let started = Instant::now();
        tokio::time::sleep(TICK_PERIOD * 5 + TICK_PERIOD / 2).await;
        for _ in 0..5 {
            assert_eq!(rx.recv().await, Some(Clock::Mission));
        }
        assert!(started.elapsed() < TICK_PERIOD * 6);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handle = spawn_clock(Clock::Mission, tx, token.clone());

        token.cancel();
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
