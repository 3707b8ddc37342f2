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
use std::{
    collections::HashMap,
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;

use crate::cache::{ResourceRef, ResourceResolver};
use crate::transport::{Clock, TickFn, TickHandle};

mod audio;
mod polling;

pub use audio::{wav_bytes, write_wav};
pub use polling::{eventually, eventually_async};

struct Scheduled {
    interval: Duration,
    tick: TickFn,
    cancelled: Arc<AtomicBool>,
}

/// A clock that only ticks when told to.
#[derive(Default)]
pub struct ManualClock {
    scheduled: Mutex<Vec<Scheduled>>,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        ManualClock::default()
    }

    /// Runs the active tick once. Returns false if nothing is scheduled.
    pub fn fire(&self) -> bool {
        let tick = {
            let scheduled = self.scheduled.lock();
            scheduled
                .iter()
                .rev()
                .find(|s| !s.cancelled.load(Ordering::Acquire))
                .map(|s| s.tick.clone())
        };
        match tick {
            Some(tick) => {
                tick();
                true
            }
            None => false,
        }
    }

    pub fn fire_n(&self, n: usize) {
        for _ in 0..n {
            self.fire();
        }
    }

    /// The interval of the active tick.
    pub fn interval(&self) -> Option<Duration> {
        self.scheduled
            .lock()
            .iter()
            .rev()
            .find(|s| !s.cancelled.load(Ordering::Acquire))
            .map(|s| s.interval)
    }

    /// How many ticks have ever been scheduled.
    pub fn schedule_count(&self) -> usize {
        self.scheduled.lock().len()
    }

    /// How many scheduled ticks have not been cancelled.
    pub fn active_count(&self) -> usize {
        self.scheduled
            .lock()
            .iter()
            .filter(|s| !s.cancelled.load(Ordering::Acquire))
            .count()
    }
}

impl Clock for ManualClock {
    fn schedule(&self, interval: Duration, tick: TickFn) -> TickHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.scheduled.lock().push(Scheduled {
            interval,
            tick,
            cancelled: cancelled.clone(),
        });
        TickHandle::new(cancelled, None)
    }
}

/// An in-memory resolver that counts fetches and can simulate slow storage.
pub struct CountingResolver {
    sounds: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl CountingResolver {
    pub fn new(delay: Duration) -> CountingResolver {
        CountingResolver {
            sounds: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.sounds.lock().insert(name.to_string(), bytes);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ResourceResolver for CountingResolver {
    fn fetch(&self, reference: &ResourceRef) -> io::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.sounds
            .lock()
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, reference.to_string()))
    }
}
