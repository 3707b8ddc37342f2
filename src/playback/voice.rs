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
use std::time::Instant;

use crate::playsync::CancelHandle;

/// One playing instance of a buffer. The mixer marks the voice finished when the buffer runs
/// out; `stop` ends it early.
#[derive(Clone)]
pub struct Voice {
    /// Unique ID for this voice, shared with its mixer source.
    id: u64,
    /// The gain the voice was started with.
    gain: f32,
    /// When this voice started playing.
    started_at: Instant,
    /// Set by the mixer once the last frame is rendered.
    is_finished: Arc<AtomicBool>,
    /// Cancel handle for stopping this voice without lock contention.
    cancel_handle: CancelHandle,
}

impl Voice {
    pub(super) fn new(
        id: u64,
        gain: f32,
        is_finished: Arc<AtomicBool>,
        cancel_handle: CancelHandle,
    ) -> Voice {
        Voice {
            id,
            gain,
            started_at: Instant::now(),
            is_finished,
            cancel_handle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns true once the voice has played out or been stopped.
    pub fn is_finished(&self) -> bool {
        self.is_finished.load(Ordering::Acquire) || self.cancel_handle.is_cancelled()
    }

    /// Stops the voice. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel_handle.cancel();
    }

    /// Blocks until the voice finishes or is stopped.
    pub fn wait(&self) {
        self.cancel_handle.wait(self.is_finished.clone());
    }

    /// Marks the voice finished without it ever reaching a mixer.
    pub(super) fn abandon(&self) {
        self.is_finished.store(true, Ordering::Release);
        self.cancel_handle.notify();
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("gain", &self.gain)
            .field("finished", &self.is_finished())
            .finish()
    }
}
