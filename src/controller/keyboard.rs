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
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::cache::ResourceRef;
use crate::pattern::DEFAULT_VELOCITY;
use crate::transport::Quantization;

const PLAY: &str = "play";
const STOP: &str = "stop";
const TOGGLE: &str = "toggle";
const RECORD: &str = "record";
const TEMPO: &str = "tempo";
const QUANTIZE: &str = "quantize";
const METRONOME: &str = "metronome";
const CELL: &str = "cell";
const SET: &str = "set";
const CLEAR: &str = "clear";
const ASSIGN: &str = "assign";
const UNASSIGN: &str = "unassign";
const HIT: &str = "hit";
const SAVE: &str = "save";
const LOAD: &str = "load";
const DELETE: &str = "delete";
const LIST: &str = "list";
const EXPORT: &str = "export";
const IMPORT: &str = "import";
const SHOW: &str = "show";
const QUIT: &str = "quit";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unrecognized command {0:?}")]
    Unknown(String),

    #[error("{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("invalid {argument} {value:?}")]
    InvalidArgument {
        argument: &'static str,
        value: String,
    },
}

fn argument<'a>(
    args: &[&'a str],
    index: usize,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, CommandError> {
    args.get(index)
        .copied()
        .ok_or(CommandError::MissingArgument { command, argument })
}

fn parsed<T: FromStr>(
    args: &[&str],
    index: usize,
    command: &'static str,
    name: &'static str,
) -> Result<T, CommandError> {
    let value = argument(args, index, command, name)?;
    value.parse().map_err(|_| CommandError::InvalidArgument {
        argument: name,
        value: value.to_string(),
    })
}

/// The rest of the line from the given argument on, for names with spaces.
fn rest(args: &[&str], index: usize) -> Option<String> {
    (index < args.len()).then(|| args[index..].join(" "))
}

/// Parses one line of keyboard input. Blank lines parse to nothing.
pub fn parse_command(input: &str) -> Result<Option<Event>, CommandError> {
    let args: Vec<&str> = input.split_whitespace().collect();
    let Some(command) = args.first() else {
        return Ok(None);
    };

    let event = match command.to_lowercase().as_str() {
        PLAY => Event::Play,
        STOP => Event::Stop,
        TOGGLE => Event::TogglePlay,
        RECORD => Event::ToggleRecord,
        TEMPO => Event::Tempo(parsed(&args, 1, TEMPO, "bpm")?),
        QUANTIZE => Event::Quantize(parsed(&args, 1, QUANTIZE, "quantization")?),
        METRONOME => match argument(&args, 1, METRONOME, "on or off")? {
            "on" => Event::Metronome(true),
            "off" => Event::Metronome(false),
            value => {
                return Err(CommandError::InvalidArgument {
                    argument: "metronome setting",
                    value: value.to_string(),
                })
            }
        },
        CELL => Event::ToggleCell {
            channel: parsed(&args, 1, CELL, "channel")?,
            step: parsed(&args, 2, CELL, "step")?,
        },
        SET => Event::SetCell {
            channel: parsed(&args, 1, SET, "channel")?,
            step: parsed(&args, 2, SET, "step")?,
            velocity: parsed(&args, 3, SET, "velocity")?,
        },
        CLEAR => match args.get(1) {
            Some(_) => Event::ClearChannel(parsed(&args, 1, CLEAR, "channel")?),
            None => Event::ClearSequence,
        },
        ASSIGN => Event::Assign {
            channel: parsed(&args, 1, ASSIGN, "channel")?,
            reference: ResourceRef::from(
                rest(&args, 2).ok_or(CommandError::MissingArgument {
                    command: ASSIGN,
                    argument: "sound",
                })?,
            ),
        },
        UNASSIGN => Event::Unassign(parsed(&args, 1, UNASSIGN, "channel")?),
        HIT => Event::Hit {
            channel: parsed(&args, 1, HIT, "channel")?,
            velocity: match args.get(2) {
                Some(_) => parsed(&args, 2, HIT, "velocity")?,
                None => DEFAULT_VELOCITY,
            },
        },
        SAVE => Event::Save(rest(&args, 1)),
        LOAD => Event::Load(rest(&args, 1).ok_or(CommandError::MissingArgument {
            command: LOAD,
            argument: "project name",
        })?),
        DELETE => Event::Delete(rest(&args, 1).ok_or(CommandError::MissingArgument {
            command: DELETE,
            argument: "project name",
        })?),
        LIST => Event::List,
        EXPORT => Event::Export(PathBuf::from(argument(&args, 1, EXPORT, "file")?)),
        IMPORT => Event::Import(PathBuf::from(argument(&args, 1, IMPORT, "file")?)),
        SHOW => Event::Show,
        QUIT | "exit" => Event::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(event))
}

/// A controller that drives the engine from typed commands.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and sends one command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "> ")?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        match parse_command(&input) {
            Ok(Some(event)) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            Ok(None) => {}
            Err(e) => {
                warn!(input = input.trim(), err = %e, "Unrecognized input");
                writeln!(writer, "{}", e)?;
            }
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}
