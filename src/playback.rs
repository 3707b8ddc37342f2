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

//! Fire-and-forget playback of decoded buffers.
//!
//! Every trigger starts a new voice; there is no voice limit and no stealing. Voices end on
//! their own when the buffer runs out.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::audio::mixer::ActiveSource;
use crate::audio::{next_source_id, SourceSender};
use crate::cache::Buffer;
use crate::pattern::MAX_VELOCITY;
use crate::playsync::CancelHandle;

mod voice;

pub use voice::Voice;

/// Converts a velocity into a linear gain. Velocities above the maximum are clamped.
pub fn velocity_to_gain(velocity: u8) -> f32 {
    velocity.min(MAX_VELOCITY) as f32 / MAX_VELOCITY as f32
}

pub struct PlaybackEngine {
    /// Sends new sources to the output device's mixer.
    source_tx: SourceSender,
    /// Voices that may still be playing.
    voices: Mutex<Vec<Voice>>,
}

impl PlaybackEngine {
    pub fn new(source_tx: SourceSender) -> PlaybackEngine {
        PlaybackEngine {
            source_tx,
            voices: Mutex::new(Vec::new()),
        }
    }

    /// Starts a new voice for the buffer at the gain for the given velocity.
    pub fn trigger(&self, buffer: &Buffer, velocity: u8) -> Voice {
        self.trigger_with_gain(buffer, velocity_to_gain(velocity))
    }

    /// Starts a new voice for the buffer at an explicit gain.
    pub fn trigger_with_gain(&self, buffer: &Buffer, gain: f32) -> Voice {
        let id = next_source_id();
        let is_finished = Arc::new(AtomicBool::new(false));
        let cancel_handle = CancelHandle::new();
        let voice = Voice::new(id, gain, is_finished.clone(), cancel_handle.clone());

        let source = ActiveSource::new(id, buffer.clone(), gain, is_finished, cancel_handle);
        if let Err(e) = self.source_tx.send(source) {
            warn!(id, err = %e, "Audio output is gone, dropping voice");
            voice.abandon();
            return voice;
        }
        debug!(id, gain, frames = buffer.frames(), "Voice started");

        let mut voices = self.voices.lock();
        voices.retain(|voice| !voice.is_finished());
        voices.push(voice.clone());
        voice
    }

    /// Returns the voices that are still playing.
    pub fn voices(&self) -> Vec<Voice> {
        let mut voices = self.voices.lock();
        voices.retain(|voice| !voice.is_finished());
        voices.clone()
    }

    /// Returns the number of voices that are still playing.
    pub fn active_voices(&self) -> usize {
        self.voices().len()
    }

    /// Stops every playing voice.
    pub fn stop_all(&self) {
        let voices = std::mem::take(&mut *self.voices.lock());
        for voice in voices.iter() {
            voice.stop();
        }
        debug!(count = voices.len(), "Stopped all voices");
    }
}
