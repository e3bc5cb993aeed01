//! Epoch-tagged deferred inputs.
//!
//! A timer captures the epoch and its [`TimerKind`] (including any value such
//! as a countdown's remaining seconds) when it is scheduled, and delivers
//! them back to the orchestrator as an input when it fires. Whether the
//! timer still applies is decided by the session at delivery time.

use crate::orchestrator::Input;
use crate::session::TimerKind;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

/// Pending timers of one orchestrator.
#[derive(Debug)]
pub(crate) struct Timers {
    tasks: JoinSet<()>,
    input_tx: mpsc::Sender<Input>,
}

impl Timers {
    pub(crate) fn new(input_tx: mpsc::Sender<Input>) -> Self {
        Self {
            tasks: JoinSet::new(),
            input_tx,
        }
    }

    /// Deliver `kind` tagged with `epoch` after `after`.
    pub(crate) fn schedule(&mut self, epoch: u64, kind: TimerKind, after: Duration) {
        self.reap();

        let input_tx = self.input_tx.clone();
        debug!(?kind, epoch, delay_ms = after.as_millis() as u64, "Timer scheduled");
        self.tasks.spawn(async move {
            tokio::time::sleep(after).await;
            // A closed channel means the orchestrator is gone.
            let _ = input_tx.send(Input::Timer { epoch, kind }).await;
        });
    }

    /// Timers not yet fired.
    #[cfg(test)]
    pub(crate) fn pending(&mut self) -> usize {
        self.reap();
        self.tasks.len()
    }

    pub(crate) fn cancel_all(&mut self) {
        self.tasks.abort_all();
    }

    fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_delivers_bound_values() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = Timers::new(tx);

        timers.schedule(4, TimerKind::Countdown { remaining_secs: 2 }, Duration::from_secs(1));
        timers.schedule(4, TimerKind::Countdown { remaining_secs: 1 }, Duration::from_secs(2));
        assert_eq!(timers.pending(), 2);

        for expected in [2, 1] {
            match rx.recv().await {
                Some(Input::Timer {
                    epoch: 4,
                    kind: TimerKind::Countdown { remaining_secs },
                }) => assert_eq!(remaining_secs, expected),
                other => panic!("unexpected input: {other:?}"),
            }
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut timers = Timers::new(tx);

        timers.schedule(1, TimerKind::LockoutReset, Duration::from_secs(3));
        timers.cancel_all();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
