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
use std::fs;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use padstep::config::init_engine_and_controller;
use padstep::project::ProjectRecord;
use padstep::{audio, midi};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pad-driven step sequencer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Checks an exported project file and prints what it contains.
    Verify {
        /// The path to the project file.
        project_path: String,
    },
    /// Start will start the sequencer and read commands from the keyboard.
    Start {
        /// The path to the engine config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { project_path } => {
            let project = ProjectRecord::from_json(&fs::read_to_string(&project_path)?)?;

            println!(
                "{} (version {}, {} bpm, saved {})",
                project.name,
                project.version,
                project.bpm,
                project.date.to_rfc3339()
            );
            for (channel, sound) in project.sounds.iter().enumerate() {
                if let Some(sound) = sound {
                    println!("- channel {}: {}", channel, sound);
                }
            }
            let hits: usize = project
                .sequence
                .iter()
                .map(|row| row.iter().filter(|velocity| **velocity > 0).count())
                .sum();
            println!("Active cells: {}", hits);
        }
        Commands::Start { config_path } => {
            init_engine_and_controller(&PathBuf::from(config_path))?
                .join()
                .await?;
        }
    }

    Ok(())
}
