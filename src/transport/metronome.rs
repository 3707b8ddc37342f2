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
use std::f32::consts::PI;
use std::sync::Arc;

use crate::cache::{Buffer, BufferCache, ResourceRef};

/// Gain of the click on the first step of the pattern.
pub const ACCENT_GAIN: f32 = 0.4;

/// Gain of the click on the other beats.
pub const BEAT_GAIN: f32 = 0.2;

const CLICK_FREQUENCY: f32 = 1500.0;
const CLICK_MILLIS: u32 = 30;

/// Where the click sound comes from.
pub enum Metronome {
    /// A short decaying sine generated at startup.
    Synthesized(Buffer),
    /// A sound loaded through the buffer cache.
    Sample(ResourceRef),
}

impl Metronome {
    pub fn synthesized(sample_rate: u32) -> Metronome {
        let num_samples = (sample_rate * CLICK_MILLIS / 1000) as usize;
        Metronome::Synthesized(Buffer::new(
            generate_click(sample_rate as f32, num_samples, CLICK_FREQUENCY),
            1,
            sample_rate,
        ))
    }

    pub fn sample(reference: ResourceRef) -> Metronome {
        Metronome::Sample(reference)
    }

    /// Returns the click gain for a step, or None if the step is not on a beat.
    pub fn gain_for_step(step: usize) -> Option<f32> {
        match step {
            0 => Some(ACCENT_GAIN),
            s if s % 4 == 0 => Some(BEAT_GAIN),
            _ => None,
        }
    }

    /// Returns the click if it is ready. A sample click that is not cached yet is skipped
    /// while it loads.
    pub fn click(&self, cache: &Arc<BufferCache>) -> Option<Buffer> {
        match self {
            Metronome::Synthesized(buffer) => Some(buffer.clone()),
            Metronome::Sample(reference) => cache.peek(reference),
        }
    }

    /// The sound reference to preload, if any.
    pub fn reference(&self) -> Option<&ResourceRef> {
        match self {
            Metronome::Synthesized(_) => None,
            Metronome::Sample(reference) => Some(reference),
        }
    }
}

/// A sine burst with a fast exponential decay.
fn generate_click(sample_rate: f32, num_samples: usize, frequency: f32) -> Vec<f32> {
    let phase_increment = 2.0 * PI * frequency / sample_rate;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / num_samples as f32;
            let envelope = (-t * 8.0).exp();
            (i as f32 * phase_increment).sin() * envelope
        })
        .collect()
}
