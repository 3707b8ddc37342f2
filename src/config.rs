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
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::info;

use crate::cache::FileResolver;
use crate::controller;
use crate::input::MidiListener;
use crate::project::FileStore;
use crate::transport::TokioClock;

mod audio;
mod engine;
mod error;
mod midi;

pub use self::audio::Audio;
pub use self::engine::{Engine, Metronome};
pub use self::error::ConfigError;
pub use self::midi::Midi;

/// How many raw MIDI events may queue between the device and the listener.
const MIDI_EVENT_BUFFER: usize = 64;

/// Initializes the engine and controller from the given config file and returns the controller.
/// Relative paths in the config are resolved against the config file's directory. Must be
/// called from within a tokio runtime.
pub fn init_engine_and_controller(
    config_path: &Path,
) -> Result<controller::Controller, Box<dyn Error>> {
    let config = Engine::deserialize(config_path)?;
    let base = config_path.parent().unwrap_or(Path::new("."));

    let audio_device = crate::audio::get_device(&config.audio())?;
    info!(device = %audio_device, "Audio output ready");

    let engine = Arc::new(crate::engine::Engine::new(
        config.engine_options(audio_device.sample_rate())?,
        audio_device.source_sender(),
        Arc::new(FileResolver::new(&config.sounds_path(base))),
        Arc::new(FileStore::new(&config.store_path(base))?),
        Arc::new(TokioClock::new(Handle::current())),
    ));
    engine.restore();

    let midi_device = match config.midi() {
        Some(midi_config) => {
            let device = crate::midi::get_device(midi_config.device())?;
            let (events_tx, events_rx) = mpsc::channel(MIDI_EVENT_BUFFER);
            device.watch_events(events_tx)?;
            MidiListener::new(engine.router().clone(), midi_config.channel()?).spawn(events_rx);
            info!(device = %device, "MIDI input ready");
            Some(device)
        }
        None => None,
    };

    controller::Controller::new(
        engine,
        Arc::new(controller::keyboard::Driver::new()),
        audio_device,
        midi_device,
    )
}
