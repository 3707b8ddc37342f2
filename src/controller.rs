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
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::cache::ResourceRef;
use crate::engine::Engine;
use crate::transport::Quantization;
use crate::{audio, midi};

pub mod keyboard;

/// Controller events that will trigger behavior in the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Starts the transport from the first step.
    Play,

    /// Stops the transport, keeping the current step.
    Stop,

    /// Plays if stopped, stops if playing.
    TogglePlay,

    /// Arms or disarms recording. Arming while stopped starts the transport.
    ToggleRecord,

    /// Sets the tempo in bpm.
    Tempo(i64),

    Quantize(Quantization),

    /// Turns the metronome on or off.
    Metronome(bool),

    /// Switches a cell between empty and the default velocity.
    ToggleCell { channel: usize, step: usize },

    SetCell {
        channel: usize,
        step: usize,
        velocity: u32,
    },

    /// Empties the whole pattern.
    ClearSequence,

    /// Empties one channel's row.
    ClearChannel(usize),

    Assign {
        channel: usize,
        reference: ResourceRef,
    },

    /// Removes a channel's sound.
    Unassign(usize),

    /// Hits a pad as if it came from the pad controller.
    Hit { channel: usize, velocity: u8 },

    /// Saves the working state into the project library.
    Save(Option<String>),

    Load(String),

    Delete(String),

    /// Lists saved projects.
    List,

    /// Writes the working state to a project file.
    Export(PathBuf),

    /// Replaces the working state with a project file.
    Import(PathBuf),

    /// Prints the transport, sounds and pattern.
    Show,

    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives the engine from a driver's events.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver. The devices are held until the
    /// controller finishes.
    pub fn new(
        engine: Arc<Engine>,
        driver: Arc<dyn Driver>,
        audio_device: Arc<dyn audio::Device>,
        midi_device: Option<Arc<dyn midi::Device>>,
    ) -> Result<Controller, Box<dyn Error>> {
        let span = span!(Level::INFO, "controller");
        Ok(Controller {
            handle: tokio::spawn(
                async move {
                    Controller::trigger_events(engine, driver).await;
                    if let Some(midi_device) = midi_device {
                        midi_device.stop_watch_events();
                    }
                    info!(device = %audio_device, "Releasing audio output.");
                }
                .instrument(span),
            ),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers engine events by watching the driver and getting events from it.
    async fn trigger_events(engine: Arc<Engine>, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(project = engine.project_name(), "Controller started.");

        loop {
            let Some(event) = events_rx.recv().await else {
                info!("Controller closing.");
                match join_handle.await {
                    Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
                    Err(e) => error!("Error waiting for event monitor to stop: {}", e),
                    Ok(Ok(())) => {}
                }
                break;
            };
            info!(event = format!("{:?}", event), "Received event.");

            if event == Event::Quit {
                info!("Quitting.");
                break;
            }
            match handle_event(&engine, event) {
                Ok(Some(output)) => println!("{}", output),
                Ok(None) => {}
                Err(e) => error!("Error talking to engine: {}", e),
            }
        }

        engine.stop();
    }
}

/// Applies a single event to the engine, returning anything that should be shown.
pub fn handle_event(engine: &Engine, event: Event) -> Result<Option<String>, Box<dyn Error>> {
    match event {
        Event::Play => engine.play(),
        Event::Stop => engine.stop(),
        Event::TogglePlay => engine.toggle_playing(),
        Event::ToggleRecord => {
            let recording = engine.toggle_recording();
            return Ok(Some(format!(
                "Recording {}",
                if recording { "armed" } else { "off" }
            )));
        }
        Event::Tempo(bpm) => {
            return Ok(Some(format!("Tempo {} bpm", engine.set_tempo(bpm))));
        }
        Event::Quantize(quantization) => engine.set_quantization(quantization),
        Event::Metronome(enabled) => engine.set_metronome(enabled),
        Event::ToggleCell { channel, step } => {
            engine.toggle_cell(channel, step)?;
        }
        Event::SetCell {
            channel,
            step,
            velocity,
        } => engine.set_cell(channel, step, velocity)?,
        Event::ClearSequence => engine.clear_sequence(),
        Event::ClearChannel(channel) => engine.clear_channel(channel)?,
        Event::Assign { channel, reference } => engine.assign_sound(channel, reference)?,
        Event::Unassign(channel) => engine.clear_sound(channel)?,
        Event::Hit { channel, velocity } => {
            let note = engine
                .router()
                .note_map()
                .note_for(channel)
                .ok_or_else(|| format!("channel {} has no pad", channel))?;
            engine.on_note_event(note, velocity, Instant::now());
        }
        Event::Save(name) => {
            let name = engine.save_project(name.as_deref())?;
            return Ok(Some(format!("Saved {:?}", name)));
        }
        Event::Load(name) => engine.load_project(&name)?,
        Event::Delete(name) => engine.delete_project(&name)?,
        Event::List => {
            let mut output = String::new();
            for project in engine.list_projects()? {
                writeln!(
                    output,
                    "{} ({} bpm, saved {})",
                    project.name,
                    project.bpm,
                    project.date.to_rfc3339()
                )?;
            }
            if output.is_empty() {
                output.push_str("No saved projects.");
            }
            return Ok(Some(output.trim_end().to_string()));
        }
        Event::Export(path) => {
            fs::write(&path, engine.export_project()?)?;
            return Ok(Some(format!("Exported to {}", path.display())));
        }
        Event::Import(path) => {
            let name = engine.import_project(&fs::read_to_string(&path)?)?;
            return Ok(Some(format!("Imported {:?}", name)));
        }
        Event::Show => return Ok(Some(show(engine)?)),
        Event::Quit => {}
    }
    Ok(None)
}

fn show(engine: &Engine) -> Result<String, std::fmt::Error> {
    let state = engine.transport_state();
    let mut output = String::new();
    writeln!(
        output,
        "{}: {} bpm, {}, {}{}, step {}",
        engine.project_name(),
        state.tempo,
        state.quantization,
        if state.playing { "playing" } else { "stopped" },
        if state.recording { " (recording)" } else { "" },
        state.current_step,
    )?;
    for (channel, sound) in engine.sounds().iter().enumerate() {
        if let Some(sound) = sound {
            writeln!(output, "{:>2}: {}", channel, sound)?;
        }
    }
    write!(output, "{}", engine.pattern())?;
    Ok(output)
}
