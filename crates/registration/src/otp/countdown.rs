//! Resend countdown for the email code.
//!
//! The countdown value itself is plain data driven by [`Countdown::tick`].
//! When a [`TickSink`] is attached, starting a countdown also spawns a
//! one-second interval task that sends [`CountdownTick`]s to the host's
//! event loop, which feeds them back through [`Countdown::apply`].
//!
//! Every start/cancel bumps a generation counter. Ticks from an older
//! generation are ignored, and the task handle aborts on drop, so a reset
//! never leaves a callback running against stale state.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// One elapsed second of a particular countdown run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    pub generation: u64,
}

pub type TickSink = mpsc::UnboundedSender<CountdownTick>;

/// Running interval task; aborted when dropped.
#[derive(Debug)]
struct TickTask {
    handle: JoinHandle<()>,
}

impl TickTask {
    fn spawn(generation: u64, ticks: u32, sink: TickSink) -> Self {
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut every_second = interval_at(Instant::now() + period, period);
            every_second.set_missed_tick_behavior(MissedTickBehavior::Delay);
            for _ in 0..ticks {
                every_second.tick().await;
                if sink.send(CountdownTick { generation }).is_err() {
                    break;
                }
            }
        });
        Self { handle }
    }
}

impl Drop for TickTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Default)]
pub struct Countdown {
    remaining: u32,
    generation: u64,
    sink: Option<TickSink>,
    task: Option<TickTask>,
}

impl Countdown {
    /// Deliver future ticks to `sink` instead of relying on manual [`tick`](Self::tick) calls.
    pub fn attach(&mut self, sink: TickSink) {
        self.sink = Some(sink);
    }

    pub fn detach(&mut self) {
        self.cancel();
        self.sink = None;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.remaining > 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a fresh run of `seconds`, replacing any run in progress.
    pub fn start(&mut self, seconds: u32) {
        self.cancel();
        self.remaining = seconds;
        if seconds > 0 {
            if let Some(sink) = &self.sink {
                self.task = Some(TickTask::spawn(self.generation, seconds, sink.clone()));
            }
        }
        debug!(seconds, generation = self.generation, "countdown started");
    }

    /// Stop the current run and zero the counter.
    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.task = None;
        self.remaining = 0;
    }

    /// Advance by one second. Returns the seconds left.
    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.task = None;
        }
        self.remaining
    }

    /// Apply a tick from the interval task. Stale ticks return `false`.
    pub fn apply(&mut self, tick: CountdownTick) -> bool {
        if tick.generation != self.generation || self.remaining == 0 {
            return false;
        }
        self.tick();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_ticks_stop_at_zero() {
        let mut c = Countdown::default();
        c.start(3);
        assert_eq!(c.tick(), 2);
        assert_eq!(c.tick(), 1);
        assert_eq!(c.tick(), 0);
        assert_eq!(c.tick(), 0);
        assert!(!c.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_task_drives_ninety_seconds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut c = Countdown::default();
        c.attach(tx);
        c.start(90);

        let mut applied = 0;
        while c.is_running() {
            let tick = rx.recv().await.expect("tick");
            assert!(c.apply(tick));
            applied += 1;
        }
        assert_eq!(applied, 90);
        assert_eq!(c.remaining(), 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "no ticks after reaching zero");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_ignores_ticks_of_previous_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut c = Countdown::default();
        c.attach(tx);
        c.start(5);
        let stale = CountdownTick {
            generation: c.generation(),
        };
        c.start(5);
        assert!(!c.apply(stale));
        assert_eq!(c.remaining(), 5);

        let fresh = rx.recv().await.expect("tick");
        assert_eq!(fresh.generation, c.generation());
        assert!(c.apply(fresh));
        assert_eq!(c.remaining(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut c = Countdown::default();
        c.attach(tx);
        c.start(30);
        c.cancel();
        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(c.remaining(), 0);
    }
}
