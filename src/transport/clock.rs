// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, span, Instrument, Level};

/// The callback run on every tick.
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Produces recurring ticks.
pub trait Clock: Send + Sync {
    /// Calls `tick` every `interval`, starting one interval from now, until the returned
    /// handle is cancelled or dropped.
    fn schedule(&self, interval: Duration, tick: TickFn) -> TickHandle;
}

/// A scheduled recurring tick. Cancelling only prevents future ticks.
pub struct TickHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TickHandle {
    /// Creates a handle around a cancellation flag and, optionally, the task driving it.
    pub fn new(cancelled: Arc<AtomicBool>, task: Option<JoinHandle<()>>) -> TickHandle {
        TickHandle { cancelled, task }
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A clock driven by the tokio timer.
pub struct TokioClock {
    runtime: Handle,
}

impl TokioClock {
    pub fn new(runtime: Handle) -> TokioClock {
        TokioClock { runtime }
    }
}

impl Clock for TokioClock {
    fn schedule(&self, interval: Duration, tick: TickFn) -> TickHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let span = span!(Level::INFO, "tick", interval_ms = interval.as_millis() as u64);

        let task = self.runtime.spawn(
            async move {
                debug!("Tick installed");
                let mut ticker = time::interval_at(Instant::now() + interval, interval);
                // A stalled runtime drops the missed ticks instead of bursting them.
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    tick();
                }
            }
            .instrument(span),
        );

        TickHandle::new(cancelled, Some(task))
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_ticks_at_interval() {
        let clock = TokioClock::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));

        let mut handle = {
            let count = count.clone();
            clock.schedule(
                Duration::from_millis(125),
                Arc::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };

        time::sleep(Duration::from_millis(124)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 9);

        handle.cancel();
        assert!(handle.is_cancelled());
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_ticks() {
        let clock = TokioClock::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));

        let handle = {
            let count = count.clone();
            clock.schedule(
                Duration::from_millis(10),
                Arc::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            )
        };
        time::sleep(Duration::from_millis(35)).await;
        drop(handle);
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
