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
// Core audio mixing logic that can be used by both CPAL and test implementations
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::Buffer;
use crate::playsync::CancelHandle;

/// Sums active voices into interleaved output frames.
#[derive(Clone)]
pub struct AudioMixer {
    /// Active audio sources currently playing
    active_sources: Arc<Mutex<Vec<ActiveSource>>>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

/// One playing buffer in the mixer.
pub struct ActiveSource {
    /// Unique ID for this source
    pub id: u64,
    /// The decoded sound being played
    pub buffer: Buffer,
    /// The next frame to render
    pub position: usize,
    /// Linear gain applied to every sample
    pub gain: f32,
    /// Set once the last frame has been rendered
    pub is_finished: Arc<AtomicBool>,
    /// Cancel handle for this source
    pub cancel_handle: CancelHandle,
}

impl ActiveSource {
    pub fn new(
        id: u64,
        buffer: Buffer,
        gain: f32,
        is_finished: Arc<AtomicBool>,
        cancel_handle: CancelHandle,
    ) -> ActiveSource {
        ActiveSource {
            id,
            buffer,
            position: 0,
            gain,
            is_finished,
            cancel_handle,
        }
    }

    fn finish(&self) {
        self.is_finished.store(true, Ordering::Release);
        self.cancel_handle.notify();
    }
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            active_sources: Arc::new(Mutex::new(Vec::new())),
            num_channels: num_channels.max(1),
            sample_rate,
        }
    }

    /// Adds a new audio source to the mixer
    pub fn add_source(&self, source: ActiveSource) {
        self.active_sources.lock().push(source);
    }

    /// Mixes `output.len() / num_channels` frames into the output, overwriting it. Sources
    /// with fewer channels than the output are spread across the output channels.
    pub fn process_into_output(&self, output: &mut [f32]) {
        output.fill(0.0);

        let out_channels = self.num_channels as usize;
        let num_frames = output.len() / out_channels;

        let mut sources = self.active_sources.lock();
        sources.retain_mut(|source| {
            if source.is_finished.load(Ordering::Acquire) {
                return false;
            }
            if source.cancel_handle.is_cancelled() {
                source.finish();
                return false;
            }

            let samples = source.buffer.samples();
            let src_channels = source.buffer.channel_count() as usize;
            let total_frames = source.buffer.frames();

            for frame in 0..num_frames {
                if source.position >= total_frames {
                    break;
                }
                let base = source.position * src_channels;
                for ch in 0..out_channels {
                    output[frame * out_channels + ch] +=
                        samples[base + ch % src_channels] * source.gain;
                }
                source.position += 1;
            }

            if source.position >= total_frames {
                source.finish();
                return false;
            }
            true
        });
    }

    /// Processes multiple frames of audio mixing
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames);
        frames
    }

    /// Returns the number of sources still playing.
    pub fn active_count(&self) -> usize {
        self.active_sources.lock().len()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
