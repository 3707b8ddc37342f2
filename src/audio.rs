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
    any::Any,
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::config;

pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod mock;

/// Hands new sources to an output device's mixer.
pub type SourceSender = crossbeam_channel::Sender<mixer::ActiveSource>;

/// Global atomic counter for generating unique source IDs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique source ID.
pub fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub trait Device: Any + fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns a sender that feeds new sources into this device's mixer.
    fn source_sender(&self) -> SourceSender;

    /// The sample rate the device renders at.
    fn sample_rate(&self) -> u32;

    /// The number of output channels.
    fn channel_count(&self) -> u16;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.sample_rate())));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
