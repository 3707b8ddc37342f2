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
use std::fmt;
#[cfg(test)]
use std::{error::Error, sync::Arc};

use tracing::debug;

use super::mixer::{ActiveSource, AudioMixer};
use super::SourceSender;

/// The channel count of every mock device.
const MOCK_CHANNELS: u16 = 2;

/// A mock device. Doesn't output anything; sources are only rendered on request.
#[derive(Clone)]
pub struct Device {
    name: String,
    mixer: AudioMixer,
    source_tx: SourceSender,
    source_rx: crossbeam_channel::Receiver<ActiveSource>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        Device {
            name: name.to_string(),
            mixer: AudioMixer::new(MOCK_CHANNELS, sample_rate),
            source_tx,
            source_rx,
        }
    }

    /// Pulls pending sources into the mixer and renders the given number of frames.
    pub fn render(&self, num_frames: usize) -> Vec<f32> {
        while let Ok(source) = self.source_rx.try_recv() {
            debug!(device = self.name, id = source.id, "Adding source");
            self.mixer.add_source(source);
        }
        self.mixer.process_frames(num_frames)
    }

    /// Returns the number of sources that are still playing.
    pub fn active_count(&self) -> usize {
        self.mixer.active_count() + self.source_rx.len()
    }
}

impl super::Device for Device {
    fn source_sender(&self) -> SourceSender {
        self.source_tx.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn channel_count(&self) -> u16 {
        self.mixer.num_channels()
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
