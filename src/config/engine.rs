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
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::{audio::Audio, error::ConfigError, midi::Midi};
use crate::cache::ResourceRef;
use crate::engine::EngineOptions;
use crate::input::{NoteMap, DEFAULT_HIGHLIGHT};
use crate::transport::{LateTriggerPolicy, Quantization, DEFAULT_TEMPO};

const DEFAULT_AUDIO_DEVICE: &str = "default";
const DEFAULT_SOUNDS_PATH: &str = "sounds";
const DEFAULT_STORE_PATH: &str = "state";

/// A YAML representation of the metronome configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Metronome {
    /// Whether the click plays while the transport runs (default: true).
    enabled: Option<bool>,

    /// A sound to click with instead of the built-in one.
    sound: Option<String>,
}

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Engine {
    /// The audio output.
    audio: Option<Audio>,

    /// The pad controller. No MIDI input when unset.
    midi: Option<Midi>,

    /// The MIDI note for each channel, in channel order. Maschine Mikro MK3 when unset.
    note_map: Option<Vec<u8>>,

    /// Where relative sound references are resolved from.
    sounds_path: Option<String>,

    /// Where working state and saved projects are kept.
    store_path: Option<String>,

    metronome: Option<Metronome>,

    /// How long a pad stays highlighted after a hit, e.g. "100ms".
    highlight_duration: Option<String>,

    /// What to do with hits whose sound is still loading: "fire" or "skip".
    late_triggers: Option<LateTriggerPolicy>,

    /// Starting tempo in bpm.
    tempo: Option<u16>,

    quantization: Option<Quantization>,
}

impl Engine {
    /// Parse an engine configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Engine, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Engine>()?)
    }

    /// Returns the audio configuration, the default device if unset.
    pub fn audio(&self) -> Audio {
        self.audio
            .clone()
            .unwrap_or_else(|| Audio::new(DEFAULT_AUDIO_DEVICE))
    }

    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    /// The sounds directory, relative to the given base if not absolute.
    pub fn sounds_path(&self, base: &Path) -> PathBuf {
        base.join(self.sounds_path.as_deref().unwrap_or(DEFAULT_SOUNDS_PATH))
    }

    /// The store directory, relative to the given base if not absolute.
    pub fn store_path(&self, base: &Path) -> PathBuf {
        base.join(self.store_path.as_deref().unwrap_or(DEFAULT_STORE_PATH))
    }

    pub fn note_map(&self) -> Result<NoteMap, ConfigError> {
        match &self.note_map {
            Some(notes) => Ok(NoteMap::new(notes)?),
            None => Ok(NoteMap::default()),
        }
    }

    /// Returns the highlight duration (default: 100ms).
    pub fn highlight_duration(&self) -> Result<Duration, ConfigError> {
        match &self.highlight_duration {
            Some(value) => Ok(DurationString::from_string(value.clone())
                .map_err(|e| ConfigError::Duration {
                    value: value.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_HIGHLIGHT),
        }
    }

    /// Builds engine options for an output running at the given sample rate.
    pub fn engine_options(&self, sample_rate: u32) -> Result<EngineOptions, ConfigError> {
        let metronome = self.metronome.clone().unwrap_or_default();
        Ok(EngineOptions {
            sample_rate,
            note_map: self.note_map()?,
            metronome: metronome.enabled.unwrap_or(true),
            metronome_sound: metronome.sound.map(ResourceRef::from),
            highlight: self.highlight_duration()?,
            late_triggers: self.late_triggers.unwrap_or_default(),
            tempo: self.tempo.unwrap_or(DEFAULT_TEMPO),
            quantization: self.quantization.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use super::*;

    fn parse(yaml: &str) -> Result<Engine, Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("padstep.yaml");
        fs::write(&path, yaml)?;
        Ok(Engine::deserialize(&path)?)
    }

    #[test]
    fn test_full_config() -> Result<(), Box<dyn Error>> {
        let config = parse(
            r#"
            audio:
              device: mock-out
              sample_rate: 48000
            midi:
              device: Maschine
              channel: 1
            note_map: [36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51]
            sounds_path: /srv/sounds
            store_path: data
            metronome:
              enabled: false
              sound: click.wav
            highlight_duration: 250ms
            late_triggers: skip
            tempo: 96
            quantization: eighth
            "#,
        )?;

        assert_eq!(config.audio().device(), "mock-out");
        assert_eq!(config.audio().sample_rate(), 48000);
        let midi = config.midi().unwrap();
        assert_eq!(midi.device(), "Maschine");
        assert_eq!(midi.channel()?, Some(1));

        let base = Path::new("/etc/padstep");
        assert_eq!(config.sounds_path(base), PathBuf::from("/srv/sounds"));
        assert_eq!(config.store_path(base), PathBuf::from("/etc/padstep/data"));

        let options = config.engine_options(48000)?;
        assert_eq!(options.sample_rate, 48000);
        assert_eq!(options.note_map.channel_for(36), Some(0));
        assert!(!options.metronome);
        assert_eq!(options.metronome_sound, Some(ResourceRef::from("click.wav")));
        assert_eq!(options.highlight, Duration::from_millis(250));
        assert_eq!(options.late_triggers, LateTriggerPolicy::Skip);
        assert_eq!(options.tempo, 96);
        assert_eq!(options.quantization, Quantization::Eighth);
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let config = parse("tempo: 120\n")?;

        assert_eq!(config.audio().device(), DEFAULT_AUDIO_DEVICE);
        assert!(config.midi().is_none());
        let base = Path::new("/etc/padstep");
        assert_eq!(config.sounds_path(base), base.join("sounds"));
        assert_eq!(config.store_path(base), base.join("state"));

        let options = config.engine_options(44100)?;
        assert!(options.metronome);
        assert_eq!(options.metronome_sound, None);
        assert_eq!(options.highlight, DEFAULT_HIGHLIGHT);
        assert_eq!(options.late_triggers, LateTriggerPolicy::Fire);
        assert_eq!(options.quantization, Quantization::Sixteenth);
        assert_eq!(options.note_map, NoteMap::default());
        Ok(())
    }

    #[test]
    fn test_invalid_values() -> Result<(), Box<dyn Error>> {
        let config = parse("note_map: [1, 2, 3]\n")?;
        assert!(matches!(
            config.engine_options(44100),
            Err(ConfigError::NoteMap(_))
        ));

        let config = parse("highlight_duration: soon\n")?;
        assert!(matches!(
            config.engine_options(44100),
            Err(ConfigError::Duration { .. })
        ));
        Ok(())
    }
}
