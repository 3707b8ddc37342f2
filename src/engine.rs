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

//! The engine owns every component and is the only way the outside world changes state.
//! Working state is written to the persistence store after each call that changes it.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, span, warn, Level};

use crate::audio::SourceSender;
use crate::cache::{BufferCache, ResourceRef, ResourceResolver};
use crate::channels::{ChannelError, ChannelRegistry};
use crate::input::{ActivePad, Hit, InputRouter, NoteMap, DEFAULT_HIGHLIGHT};
use crate::pattern::{Pattern, PatternError};
use crate::playback::PlaybackEngine;
use crate::project::store::{BPM_KEY, PROJECTS_KEY, SEQUENCE_KEY, SOUNDS_KEY};
use crate::project::{
    ImportValidationError, PersistenceStore, ProjectRecord, StoreError, DEFAULT_NAME,
};
use crate::transport::{
    clamp_tempo, Clock, LateTriggerPolicy, Metronome, Quantization, StepSequencer, Transport,
    TransportState, DEFAULT_TEMPO,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("import failed: {0}")]
    Import(#[from] ImportValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unable to serialize project: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no saved project named {0:?}")]
    ProjectNotFound(String),
}

/// Everything the engine needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// The output sample rate. Sounds are resampled to this when decoded.
    pub sample_rate: u32,
    pub note_map: NoteMap,
    pub metronome: bool,
    /// A sound to use for the click instead of the built-in one.
    pub metronome_sound: Option<ResourceRef>,
    pub highlight: Duration,
    pub late_triggers: LateTriggerPolicy,
    pub tempo: u16,
    pub quantization: Quantization,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            sample_rate: 44100,
            note_map: NoteMap::default(),
            metronome: true,
            metronome_sound: None,
            highlight: DEFAULT_HIGHLIGHT,
            late_triggers: LateTriggerPolicy::default(),
            tempo: DEFAULT_TEMPO,
            quantization: Quantization::default(),
        }
    }
}

pub struct Engine {
    channels: Arc<ChannelRegistry>,
    playback: Arc<PlaybackEngine>,
    pattern: Arc<RwLock<Pattern>>,
    transport: Transport,
    router: Arc<InputRouter>,
    store: Arc<dyn PersistenceStore>,
    project_name: Mutex<String>,
}

impl Engine {
    /// Builds an engine. Must be called from within a tokio runtime.
    pub fn new(
        options: EngineOptions,
        source_tx: SourceSender,
        resolver: Arc<dyn ResourceResolver>,
        store: Arc<dyn PersistenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Engine {
        let runtime = Handle::current();
        let cache = Arc::new(BufferCache::new(resolver, options.sample_rate));
        let channels = Arc::new(ChannelRegistry::new(cache, runtime.clone()));
        let playback = Arc::new(PlaybackEngine::new(source_tx));
        let pattern = Arc::new(RwLock::new(Pattern::new()));

        let metronome = match options.metronome_sound {
            Some(reference) => Metronome::sample(reference),
            None => Metronome::synthesized(options.sample_rate),
        };
        let initial = TransportState {
            tempo: clamp_tempo(options.tempo as i64),
            quantization: options.quantization,
            metronome: options.metronome,
            ..Default::default()
        };
        let transport = Transport::new(
            StepSequencer::new(
                initial,
                pattern.clone(),
                channels.clone(),
                playback.clone(),
                metronome,
                options.late_triggers,
                runtime.clone(),
            ),
            clock,
        );
        let router = Arc::new(InputRouter::new(
            options.note_map,
            channels.clone(),
            playback.clone(),
            pattern.clone(),
            transport.shared_state(),
            options.highlight,
            runtime,
        ));

        Engine {
            channels,
            playback,
            pattern,
            transport,
            router,
            store,
            project_name: Mutex::new(DEFAULT_NAME.to_string()),
        }
    }

    /// Reloads sounds, sequence and tempo from the store. Anything malformed is skipped.
    pub fn restore(&self) {
        let span = span!(Level::INFO, "restore");
        let _enter = span.enter();

        if let Some(sounds) = self.load_key::<Vec<Option<ResourceRef>>>(SOUNDS_KEY) {
            match self.channels.replace_all(&sounds) {
                Ok(()) => info!(
                    assigned = sounds.iter().flatten().count(),
                    "Restored sounds"
                ),
                Err(e) => warn!(err = %e, "Ignoring stored sounds"),
            }
        }

        if let Some(rows) = self.load_key::<Vec<Vec<u8>>>(SEQUENCE_KEY) {
            match Pattern::from_rows(&rows) {
                Ok(pattern) => {
                    info!(active = pattern.active_cells(), "Restored sequence");
                    *self.pattern.write() = pattern;
                }
                Err(e) => warn!(err = %e, "Ignoring stored sequence"),
            }
        }

        if let Some(bpm) = self.load_key::<i64>(BPM_KEY) {
            self.transport.set_tempo(bpm);
        }
    }

    fn load_key<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let blob = match self.store.load(key) {
            Ok(blob) => blob?,
            Err(e) => {
                warn!(key, err = %e, "Unable to read stored state");
                return None;
            }
        };
        match serde_json::from_str(&blob) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, err = %e, "Stored state is malformed");
                None
            }
        }
    }

    fn persist(&self, key: &str, value: &impl serde::Serialize) {
        let result = serde_json::to_string(value)
            .map_err(EngineError::from)
            .and_then(|blob| Ok(self.store.save(key, &blob)?));
        if let Err(e) = result {
            warn!(key, err = %e, "Unable to persist state");
        }
    }

    fn persist_sounds(&self) {
        self.persist(SOUNDS_KEY, &self.channels.sounds());
    }

    fn persist_sequence(&self) {
        let rows = self.pattern.read().rows();
        self.persist(SEQUENCE_KEY, &rows);
    }

    fn persist_bpm(&self) {
        self.persist(BPM_KEY, &self.transport.state().tempo);
    }

    pub fn assign_sound(&self, channel: usize, reference: ResourceRef) -> Result<(), EngineError> {
        self.channels.assign(channel, reference)?;
        self.persist_sounds();
        Ok(())
    }

    pub fn clear_sound(&self, channel: usize) -> Result<(), EngineError> {
        self.channels.clear(channel)?;
        self.persist_sounds();
        Ok(())
    }

    pub fn resolve_sound(&self, channel: usize) -> Option<ResourceRef> {
        self.channels.resolve(channel)
    }

    pub fn sounds(&self) -> Vec<Option<ResourceRef>> {
        self.channels.sounds()
    }

    pub fn set_cell(&self, channel: usize, step: usize, velocity: u32) -> Result<(), EngineError> {
        self.pattern.write().set(channel, step, velocity)?;
        self.persist_sequence();
        Ok(())
    }

    /// Switches a cell between empty and the default velocity. A cell switched on is
    /// previewed if its sound is already loaded.
    pub fn toggle_cell(&self, channel: usize, step: usize) -> Result<u8, EngineError> {
        let velocity = self.pattern.write().toggle(channel, step)?;
        self.persist_sequence();

        if velocity > 0 {
            let buffer = self
                .channels
                .resolve(channel)
                .and_then(|reference| self.channels.cache().peek(&reference));
            if let Some(buffer) = buffer {
                self.playback.trigger(&buffer, velocity);
            }
        }
        Ok(velocity)
    }

    /// Empties the pattern and rewinds to the first step.
    pub fn clear_sequence(&self) {
        self.pattern.write().clear();
        self.transport.reset_step();
        if let Err(e) = self.store.remove(SEQUENCE_KEY) {
            warn!(err = %e, "Unable to remove stored sequence");
        }
        info!("Sequence cleared");
    }

    pub fn clear_channel(&self, channel: usize) -> Result<(), EngineError> {
        self.pattern.write().clear_channel(channel)?;
        self.persist_sequence();
        Ok(())
    }

    /// A snapshot of the pattern.
    pub fn pattern(&self) -> Pattern {
        self.pattern.read().clone()
    }

    pub fn play(&self) {
        self.transport.play();
    }

    /// Stops the transport, saving anything recorded.
    pub fn stop(&self) {
        let was_recording = self.transport.is_recording();
        self.transport.stop();
        if was_recording {
            self.persist_sequence();
        }
    }

    pub fn toggle_playing(&self) {
        if self.transport.is_playing() {
            self.stop();
        } else {
            self.play();
        }
    }

    /// Flips recording, returning the new value. Disarming saves what was recorded.
    pub fn toggle_recording(&self) -> bool {
        let recording = self.transport.toggle_recording();
        if !recording {
            self.persist_sequence();
        }
        recording
    }

    /// Sets the tempo, clamped to the supported range.
    pub fn set_tempo(&self, bpm: i64) -> u16 {
        let tempo = self.transport.set_tempo(bpm);
        self.persist_bpm();
        tempo
    }

    pub fn set_quantization(&self, quantization: Quantization) {
        self.transport.set_quantization(quantization);
    }

    pub fn set_metronome(&self, enabled: bool) {
        self.transport.set_metronome(enabled);
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Routes a pad hit.
    pub fn on_note_event(&self, note: u8, velocity: u8, timestamp: Instant) -> Option<Hit> {
        self.router.on_note_event(note, velocity, timestamp)
    }

    pub fn active_pad(&self, now: Instant) -> Option<ActivePad> {
        self.router.active_pad(now)
    }

    pub fn project_name(&self) -> String {
        self.project_name.lock().clone()
    }

    fn current_record(&self, name: &str) -> ProjectRecord {
        ProjectRecord::new(
            name,
            self.channels.sounds(),
            self.pattern.read().rows(),
            self.transport.state().tempo,
        )
    }

    /// Serializes the working state as a project.
    pub fn export_project(&self) -> Result<String, EngineError> {
        Ok(self.current_record(&self.project_name()).to_json()?)
    }

    /// Replaces the working state with an exported project. Nothing changes unless the
    /// whole project is valid.
    pub fn import_project(&self, json: &str) -> Result<String, EngineError> {
        let record = ProjectRecord::from_json(json)?;
        self.apply(&record)?;
        info!(name = record.name, "Imported project");
        Ok(record.name)
    }

    fn apply(&self, record: &ProjectRecord) -> Result<(), EngineError> {
        let pattern = Pattern::from_rows(&record.sequence)?;
        self.channels.replace_all(&record.sounds)?;
        *self.pattern.write() = pattern;
        self.transport.set_tempo(record.bpm as i64);
        *self.project_name.lock() = record.name.clone();

        self.persist_sounds();
        self.persist_sequence();
        self.persist_bpm();
        Ok(())
    }

    /// Lists the saved projects in the order they were first saved.
    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>, EngineError> {
        match self.store.load(PROJECTS_KEY)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(Vec::new()),
        }
    }

    /// Saves the working state into the library, replacing any project of the same name.
    /// Without a name the current project name is used.
    pub fn save_project(&self, name: Option<&str>) -> Result<String, EngineError> {
        let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => self.project_name(),
        };
        let record = self.current_record(&name);

        let mut projects = self.list_projects()?;
        match projects.iter_mut().find(|project| project.name == record.name) {
            Some(existing) => *existing = record.clone(),
            None => projects.push(record.clone()),
        }
        self.store
            .save(PROJECTS_KEY, &serde_json::to_string(&projects)?)?;

        *self.project_name.lock() = record.name.clone();
        info!(name = record.name, "Saved project");
        Ok(record.name)
    }

    pub fn load_project(&self, name: &str) -> Result<(), EngineError> {
        let record = self
            .list_projects()?
            .into_iter()
            .find(|project| project.name == name)
            .ok_or_else(|| EngineError::ProjectNotFound(name.to_string()))?;
        self.apply(&record)?;
        info!(name, "Loaded project");
        Ok(())
    }

    /// Removes a project from the library. Deleting the current project resets its name.
    pub fn delete_project(&self, name: &str) -> Result<(), EngineError> {
        let mut projects = self.list_projects()?;
        let before = projects.len();
        projects.retain(|project| project.name != name);
        if projects.len() == before {
            return Err(EngineError::ProjectNotFound(name.to_string()));
        }
        self.store
            .save(PROJECTS_KEY, &serde_json::to_string(&projects)?)?;

        let mut project_name = self.project_name.lock();
        if *project_name == name {
            *project_name = DEFAULT_NAME.to_string();
        }
        debug!(name, "Deleted project");
        Ok(())
    }

    pub fn playback(&self) -> &Arc<PlaybackEngine> {
        &self.playback
    }

    pub fn router(&self) -> &Arc<InputRouter> {
        &self.router
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::audio::mixer::ActiveSource;
    use crate::project::MemoryStore;
    use crate::testutil::{eventually_async, wav_bytes, CountingResolver, ManualClock};

    struct Fixture {
        engine: Engine,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        sources: crossbeam_channel::Receiver<ActiveSource>,
    }

    fn fixture_with_store(store: Arc<MemoryStore>) -> Fixture {
        let resolver = Arc::new(CountingResolver::new(Duration::ZERO));
        resolver.insert("kick.wav", wav_bytes(&[vec![1000i16; 32]], 44100).unwrap());
        resolver.insert("snare.wav", wav_bytes(&[vec![-1000i16; 32]], 44100).unwrap());
        let clock = Arc::new(ManualClock::new());
        let (tx, sources) = crossbeam_channel::unbounded();
        let options = EngineOptions {
            metronome: false,
            ..Default::default()
        };
        let engine = Engine::new(options, tx, resolver, store.clone(), clock.clone());
        Fixture {
            engine,
            clock,
            store,
            sources,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_store(Arc::new(MemoryStore::new()))
    }

    async fn loaded(engine: &Engine, reference: &str) {
        engine
            .channels
            .cache()
            .load(&ResourceRef::from(reference))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pattern_plays_at_velocity_gain() {
        let f = fixture();
        f.engine.assign_sound(0, ResourceRef::from("kick.wav")).unwrap();
        loaded(&f.engine, "kick.wav").await;
        f.engine.set_cell(0, 0, 100).unwrap();

        f.engine.play();
        assert_eq!(f.clock.interval(), Some(Duration::from_millis(125)));
        f.clock.fire_n(15);
        assert!(f.sources.is_empty());

        f.clock.fire();
        assert_eq!(f.engine.transport_state().current_step, 0);
        let source = f.sources.try_recv().unwrap();
        assert!((source.gain - 0.787).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_hits_render_through_the_output_device() {
        use crate::audio::Device as _;

        let device = crate::audio::get_device(&crate::config::Audio::new("mock-out")).unwrap();
        let mock = device.to_mock().unwrap();
        let resolver = Arc::new(CountingResolver::new(Duration::ZERO));
        resolver.insert("kick.wav", wav_bytes(&[vec![16384i16; 8]], 44100).unwrap());
        let engine = Engine::new(
            EngineOptions {
                metronome: false,
                ..Default::default()
            },
            device.source_sender(),
            resolver,
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new()),
        );
        engine.assign_sound(0, ResourceRef::from("kick.wav")).unwrap();
        loaded(&engine, "kick.wav").await;

        engine.on_note_event(12, 127, Instant::now());
        let frames = mock.render(4);
        assert_eq!(frames.len(), 8);
        assert!(frames.iter().all(|sample| (sample - 0.5).abs() < 1e-3));
        assert_eq!(mock.active_count(), 1);
    }

    #[tokio::test]
    async fn test_recording_while_stopped_starts_playback() {
        let f = fixture();
        assert!(f.engine.toggle_recording());
        let state = f.engine.transport_state();
        assert!(state.playing);
        assert!(state.recording);

        assert!(!f.engine.toggle_recording());
        assert!(f.engine.transport_state().playing);
    }

    #[tokio::test]
    async fn test_recorded_hits_are_saved_when_recording_ends() {
        let f = fixture();
        f.engine.toggle_recording();
        f.clock.fire_n(3);

        let hit = f.engine.on_note_event(12, 110, Instant::now()).unwrap();
        assert_eq!(hit.recorded_step, Some(3));
        assert_eq!(f.store.load(SEQUENCE_KEY).unwrap(), None);

        f.engine.stop();
        let rows: Vec<Vec<u8>> =
            serde_json::from_str(&f.store.load(SEQUENCE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(rows[0][3], 110);
        assert_eq!(f.engine.transport_state().current_step, 3);
    }

    #[tokio::test]
    async fn test_edits_are_persisted() {
        let f = fixture();
        f.engine.assign_sound(2, ResourceRef::from("snare.wav")).unwrap();
        f.engine.set_cell(2, 4, 64).unwrap();
        f.engine.set_tempo(300);

        let sounds: Vec<Option<ResourceRef>> =
            serde_json::from_str(&f.store.load(SOUNDS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(sounds[2], Some(ResourceRef::from("snare.wav")));
        assert_eq!(f.store.load(BPM_KEY).unwrap(), Some("240".to_string()));

        let restored = fixture_with_store(f.store.clone());
        restored.engine.restore();
        assert_eq!(
            restored.engine.resolve_sound(2),
            Some(ResourceRef::from("snare.wav"))
        );
        assert_eq!(restored.engine.pattern().get(2, 4).unwrap(), 64);
        assert_eq!(restored.engine.transport_state().tempo, 240);
    }

    #[tokio::test]
    async fn test_restore_ignores_malformed_state() {
        let store = Arc::new(MemoryStore::new());
        store.save(SEQUENCE_KEY, "[[1, 2]]").unwrap();
        store.save(SOUNDS_KEY, "not json").unwrap();
        store.save(BPM_KEY, "90").unwrap();

        let f = fixture_with_store(store);
        f.engine.restore();
        assert_eq!(f.engine.pattern().active_cells(), 0);
        assert_eq!(f.engine.sounds(), vec![None; 16]);
        assert_eq!(f.engine.transport_state().tempo, 90);
    }

    #[tokio::test]
    async fn test_invalid_cell_is_rejected() {
        let f = fixture();
        assert!(matches!(
            f.engine.set_cell(16, 0, 100),
            Err(EngineError::Pattern(PatternError::InvalidCellAddress { .. }))
        ));
        assert!(matches!(
            f.engine.set_cell(0, 0, 128),
            Err(EngineError::Pattern(PatternError::InvalidVelocity(128)))
        ));
        assert_eq!(f.engine.pattern().active_cells(), 0);
        assert_eq!(f.store.load(SEQUENCE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_toggle_cell_previews_loaded_sound() {
        let f = fixture();
        f.engine.assign_sound(1, ResourceRef::from("snare.wav")).unwrap();
        loaded(&f.engine, "snare.wav").await;

        assert_eq!(f.engine.toggle_cell(1, 5).unwrap(), 100);
        assert!((f.sources.try_recv().unwrap().gain - 100.0 / 127.0).abs() < 1e-6);

        assert_eq!(f.engine.toggle_cell(1, 5).unwrap(), 0);
        assert!(f.sources.is_empty());
    }

    #[tokio::test]
    async fn test_clear_sequence_resets_step() {
        let f = fixture();
        f.engine.set_cell(0, 1, 10).unwrap();
        f.engine.set_cell(3, 1, 10).unwrap();
        f.engine.play();
        f.clock.fire_n(5);

        f.engine.clear_channel(3).unwrap();
        assert_eq!(f.engine.pattern().active_cells(), 1);

        f.engine.clear_sequence();
        assert_eq!(f.engine.pattern().active_cells(), 0);
        assert_eq!(f.engine.transport_state().current_step, 0);
        assert_eq!(f.store.load(SEQUENCE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_export_import() {
        let f = fixture();
        f.engine.assign_sound(0, ResourceRef::from("kick.wav")).unwrap();
        f.engine.set_cell(0, 0, 100).unwrap();
        f.engine.set_cell(9, 15, 1).unwrap();
        f.engine.set_tempo(87);
        let exported = f.engine.export_project().unwrap();

        let other = fixture();
        let name = other.engine.import_project(&exported).unwrap();
        assert_eq!(name, DEFAULT_NAME);
        assert_eq!(other.engine.sounds(), f.engine.sounds());
        assert_eq!(other.engine.pattern(), f.engine.pattern());
        assert_eq!(other.engine.transport_state().tempo, 87);

        // The imported sounds are preloaded.
        let cache = other.engine.channels.cache().clone();
        eventually_async(
            || {
                let cache = cache.clone();
                async move { cache.peek(&ResourceRef::from("kick.wav")).is_some() }
            },
            "imported sound never loaded",
        )
        .await;
    }

    #[tokio::test]
    async fn test_failed_import_changes_nothing() {
        let f = fixture();
        f.engine.assign_sound(0, ResourceRef::from("kick.wav")).unwrap();
        f.engine.set_cell(0, 0, 100).unwrap();
        f.engine.set_tempo(100);
        let before = f.engine.export_project().unwrap();

        let json = serde_json::json!({
            "name": "Broken",
            "sounds": vec![serde_json::Value::Null; 16],
            "sequence": vec![vec![0; 16]; 16],
        });
        assert!(matches!(
            f.engine.import_project(&json.to_string()),
            Err(EngineError::Import(ImportValidationError::MissingField(
                "bpm"
            )))
        ));

        assert_eq!(f.engine.project_name(), DEFAULT_NAME);
        assert_eq!(f.engine.transport_state().tempo, 100);
        assert_eq!(f.engine.pattern().get(0, 0).unwrap(), 100);
        let after = ProjectRecord::from_json(&f.engine.export_project().unwrap()).unwrap();
        let before = ProjectRecord::from_json(&before).unwrap();
        assert_eq!(after.sounds, before.sounds);
        assert_eq!(after.sequence, before.sequence);
    }

    #[tokio::test]
    async fn test_project_library() {
        let f = fixture();
        f.engine.set_cell(0, 0, 100).unwrap();
        assert_eq!(f.engine.save_project(None).unwrap(), DEFAULT_NAME);

        f.engine.set_cell(0, 0, 50).unwrap();
        f.engine.set_tempo(150);
        assert_eq!(f.engine.save_project(Some("Fast")).unwrap(), "Fast");
        assert_eq!(f.engine.project_name(), "Fast");

        // Saving under an existing name replaces it in place.
        f.engine.set_cell(1, 1, 1).unwrap();
        f.engine.save_project(Some("Fast")).unwrap();
        let names: Vec<String> = f
            .engine
            .list_projects()
            .unwrap()
            .into_iter()
            .map(|project| project.name)
            .collect();
        assert_eq!(names, vec![DEFAULT_NAME.to_string(), "Fast".to_string()]);

        f.engine.load_project(DEFAULT_NAME).unwrap();
        assert_eq!(f.engine.pattern().get(0, 0).unwrap(), 100);
        assert_eq!(f.engine.pattern().get(1, 1).unwrap(), 0);
        assert_eq!(f.engine.transport_state().tempo, 120);
        assert_eq!(f.engine.project_name(), DEFAULT_NAME);

        assert!(matches!(
            f.engine.load_project("Missing"),
            Err(EngineError::ProjectNotFound(_))
        ));

        f.engine.delete_project(DEFAULT_NAME).unwrap();
        assert_eq!(f.engine.project_name(), DEFAULT_NAME);
        assert_eq!(f.engine.list_projects().unwrap().len(), 1);
        assert!(matches!(
            f.engine.delete_project(DEFAULT_NAME),
            Err(EngineError::ProjectNotFound(_))
        ));
    }
}
