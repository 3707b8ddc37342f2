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

//! Pad input: maps incoming notes to channels, plays them live and, while recording, writes
//! them into the pattern at the current step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::channels::{ChannelRegistry, CHANNEL_COUNT};
use crate::pattern::{Pattern, MAX_VELOCITY};
use crate::playback::PlaybackEngine;
use crate::transport::TransportState;

pub mod listener;

pub use listener::{MidiListener, NoteEvent};

/// How long a pad stays highlighted after a hit.
pub const DEFAULT_HIGHLIGHT: Duration = Duration::from_millis(100);

/// Pad notes of a Maschine Mikro MK3, indexed by channel.
pub const MASCHINE_MIKRO_MK3: [u8; CHANNEL_COUNT] =
    [12, 13, 14, 15, 8, 9, 10, 11, 4, 5, 6, 7, 0, 1, 2, 3];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NoteMapError {
    #[error("note map must list 16 notes, found {0}")]
    WrongLength(usize),

    #[error("note {0} is not a valid MIDI note")]
    NoteOutOfRange(u8),

    #[error("note {0} is mapped to more than one channel")]
    Duplicate(u8),
}

/// A one-to-one mapping between 16 MIDI notes and the channels.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteMap {
    notes: [u8; CHANNEL_COUNT],
    channels: [Option<usize>; 128],
}

impl NoteMap {
    /// Builds a map from the note for each channel, in channel order.
    pub fn new(notes: &[u8]) -> Result<NoteMap, NoteMapError> {
        if notes.len() != CHANNEL_COUNT {
            return Err(NoteMapError::WrongLength(notes.len()));
        }

        let mut map = NoteMap {
            notes: [0; CHANNEL_COUNT],
            channels: [None; 128],
        };
        for (channel, note) in notes.iter().enumerate() {
            let slot = map
                .channels
                .get_mut(*note as usize)
                .ok_or(NoteMapError::NoteOutOfRange(*note))?;
            if slot.is_some() {
                return Err(NoteMapError::Duplicate(*note));
            }
            *slot = Some(channel);
            map.notes[channel] = *note;
        }
        Ok(map)
    }

    pub fn channel_for(&self, note: u8) -> Option<usize> {
        self.channels.get(note as usize).copied().flatten()
    }

    pub fn note_for(&self, channel: usize) -> Option<u8> {
        self.notes.get(channel).copied()
    }
}

impl Default for NoteMap {
    fn default() -> Self {
        let mut channels = [None; 128];
        for (channel, note) in MASCHINE_MIKRO_MK3.iter().enumerate() {
            channels[*note as usize] = Some(channel);
        }
        NoteMap {
            notes: MASCHINE_MIKRO_MK3,
            channels,
        }
    }
}

/// The most recently hit pad, for highlighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivePad {
    pub channel: usize,
    pub velocity: u8,
    pub triggered_at: Instant,
    pub expires_at: Instant,
}

impl ActivePad {
    pub fn is_active(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// The result of a routed hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub channel: usize,
    pub velocity: u8,
    /// The step written to, if the hit was recorded.
    pub recorded_step: Option<usize>,
}

pub struct InputRouter {
    note_map: NoteMap,
    channels: Arc<ChannelRegistry>,
    playback: Arc<PlaybackEngine>,
    pattern: Arc<RwLock<Pattern>>,
    transport: Arc<Mutex<TransportState>>,
    highlight: Duration,
    active_pad: Mutex<Option<ActivePad>>,
    runtime: Handle,
}

impl InputRouter {
    pub fn new(
        note_map: NoteMap,
        channels: Arc<ChannelRegistry>,
        playback: Arc<PlaybackEngine>,
        pattern: Arc<RwLock<Pattern>>,
        transport: Arc<Mutex<TransportState>>,
        highlight: Duration,
        runtime: Handle,
    ) -> InputRouter {
        InputRouter {
            note_map,
            channels,
            playback,
            pattern,
            transport,
            highlight,
            active_pad: Mutex::new(None),
            runtime,
        }
    }

    pub fn note_map(&self) -> &NoteMap {
        &self.note_map
    }

    /// Handles a note from an input source. Unmapped notes and zero velocities are ignored.
    /// A hit is played immediately regardless of the transport and, while playing and
    /// recording, overwrites the cell at the current step.
    pub fn on_note_event(&self, note: u8, velocity: u8, timestamp: Instant) -> Option<Hit> {
        let Some(channel) = self.note_map.channel_for(note) else {
            debug!(note, "Ignoring unmapped note");
            return None;
        };
        if velocity == 0 {
            return None;
        }
        let velocity = velocity.min(MAX_VELOCITY);

        self.trigger_live(channel, velocity);

        let recording_step = {
            let state = self.transport.lock();
            (state.playing && state.recording).then_some(state.current_step)
        };
        let recorded_step = recording_step.and_then(|step| {
            match self.pattern.write().set(channel, step, velocity as u32) {
                Ok(()) => Some(step),
                Err(e) => {
                    warn!(channel, step, err = %e, "Unable to record hit");
                    None
                }
            }
        });
        if let Some(step) = recorded_step {
            debug!(channel, step, velocity, "Recorded hit");
        }

        *self.active_pad.lock() = Some(ActivePad {
            channel,
            velocity,
            triggered_at: timestamp,
            expires_at: timestamp + self.highlight,
        });

        Some(Hit {
            channel,
            velocity,
            recorded_step,
        })
    }

    /// Triggers a channel directly, loading its sound first if needed.
    pub fn trigger_live(&self, channel: usize, velocity: u8) {
        let Some(reference) = self.channels.resolve(channel) else {
            debug!(channel, "No sound assigned");
            return;
        };

        let cache = self.channels.cache().clone();
        if let Some(buffer) = cache.peek(&reference) {
            self.playback.trigger(&buffer, velocity);
            return;
        }

        let playback = self.playback.clone();
        self.runtime.spawn(async move {
            match cache.load(&reference).await {
                Ok(buffer) => {
                    playback.trigger(&buffer, velocity);
                }
                Err(e) => warn!(channel, err = %e, "Unable to play pad"),
            }
        });
    }

    /// Returns the highlighted pad, if its highlight has not expired.
    pub fn active_pad(&self, now: Instant) -> Option<ActivePad> {
        self.active_pad.lock().filter(|pad| pad.is_active(now))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::mixer::ActiveSource;
    use crate::cache::{BufferCache, ResourceRef};
    use crate::testutil::{eventually_async, wav_bytes, CountingResolver};

    struct Fixture {
        router: InputRouter,
        pattern: Arc<RwLock<Pattern>>,
        transport: Arc<Mutex<TransportState>>,
        channels: Arc<ChannelRegistry>,
        sources: crossbeam_channel::Receiver<ActiveSource>,
    }

    async fn fixture() -> Fixture {
        let resolver = Arc::new(CountingResolver::new(Duration::ZERO));
        resolver.insert("kick.wav", wav_bytes(&[vec![1000i16; 32]], 44100).unwrap());
        let cache = Arc::new(BufferCache::new(resolver, 44100));
        let channels = Arc::new(ChannelRegistry::new(cache.clone(), Handle::current()));
        channels.assign(0, ResourceRef::from("kick.wav")).unwrap();
        cache.load(&ResourceRef::from("kick.wav")).await.unwrap();

        let (tx, sources) = crossbeam_channel::unbounded();
        let pattern = Arc::new(RwLock::new(Pattern::new()));
        let transport = Arc::new(Mutex::new(TransportState::default()));
        let router = InputRouter::new(
            NoteMap::default(),
            channels.clone(),
            Arc::new(PlaybackEngine::new(tx)),
            pattern.clone(),
            transport.clone(),
            DEFAULT_HIGHLIGHT,
            Handle::current(),
        );
        Fixture {
            router,
            pattern,
            transport,
            channels,
            sources,
        }
    }

    #[test]
    fn test_default_note_map() {
        let map = NoteMap::default();
        let expected = [
            (12, 0),
            (13, 1),
            (14, 2),
            (15, 3),
            (8, 4),
            (9, 5),
            (10, 6),
            (11, 7),
            (4, 8),
            (5, 9),
            (6, 10),
            (7, 11),
            (0, 12),
            (1, 13),
            (2, 14),
            (3, 15),
        ];
        for (note, channel) in expected {
            assert_eq!(map.channel_for(note), Some(channel));
            assert_eq!(map.note_for(channel), Some(note));
        }
        assert_eq!(map.channel_for(16), None);
        assert_eq!(map.channel_for(200), None);
    }

    #[test]
    fn test_note_map_validation() {
        assert_eq!(NoteMap::new(&[1, 2]), Err(NoteMapError::WrongLength(2)));

        let mut notes: Vec<u8> = (36..52).collect();
        assert!(NoteMap::new(&notes).is_ok());

        notes[3] = 36;
        assert_eq!(NoteMap::new(&notes), Err(NoteMapError::Duplicate(36)));

        notes[3] = 130;
        assert_eq!(NoteMap::new(&notes), Err(NoteMapError::NoteOutOfRange(130)));
    }

    #[tokio::test]
    async fn test_unmapped_note_changes_nothing() {
        let f = fixture().await;
        {
            let mut state = f.transport.lock();
            state.playing = true;
            state.recording = true;
        }
        let now = Instant::now();

        assert_eq!(f.router.on_note_event(60, 100, now), None);
        assert!(f.sources.is_empty());
        assert_eq!(f.pattern.read().active_cells(), 0);
        assert_eq!(f.router.active_pad(now), None);
    }

    #[tokio::test]
    async fn test_hit_plays_while_stopped_without_recording() {
        let f = fixture().await;
        let now = Instant::now();

        let hit = f.router.on_note_event(12, 100, now).unwrap();
        assert_eq!(hit.channel, 0);
        assert_eq!(hit.recorded_step, None);

        let source = f.sources.try_recv().unwrap();
        assert!((source.gain - 100.0 / 127.0).abs() < 1e-6);
        assert_eq!(f.pattern.read().active_cells(), 0);
    }

    #[tokio::test]
    async fn test_recording_overwrites_current_step() {
        let f = fixture().await;
        {
            let mut state = f.transport.lock();
            state.playing = true;
            state.recording = true;
            state.current_step = 6;
        }
        f.pattern.write().set(4, 6, 20).unwrap();

        let hit = f.router.on_note_event(8, 90, Instant::now()).unwrap();
        assert_eq!(hit.channel, 4);
        assert_eq!(hit.recorded_step, Some(6));
        assert_eq!(f.pattern.read().get(4, 6).unwrap(), 90);
    }

    #[tokio::test]
    async fn test_recording_flag_without_playing_does_not_record() {
        let f = fixture().await;
        f.transport.lock().recording = true;

        f.router.on_note_event(12, 90, Instant::now());
        assert_eq!(f.pattern.read().active_cells(), 0);
    }

    #[tokio::test]
    async fn test_unassigned_channel_still_records() {
        let f = fixture().await;
        f.channels.clear(0).unwrap();
        {
            let mut state = f.transport.lock();
            state.playing = true;
            state.recording = true;
            state.current_step = 3;
        }

        let hit = f.router.on_note_event(12, 70, Instant::now()).unwrap();
        assert_eq!(hit.recorded_step, Some(3));
        assert_eq!(f.pattern.read().get(0, 3).unwrap(), 70);
        assert!(f.sources.is_empty());
    }

    #[tokio::test]
    async fn test_zero_velocity_is_ignored() {
        let f = fixture().await;
        let now = Instant::now();
        assert_eq!(f.router.on_note_event(12, 0, now), None);
        assert!(f.sources.is_empty());
        assert_eq!(f.router.active_pad(now), None);
    }

    #[tokio::test]
    async fn test_velocity_is_clamped() {
        let f = fixture().await;
        let hit = f.router.on_note_event(12, 200, Instant::now()).unwrap();
        assert_eq!(hit.velocity, 127);
        assert_eq!(f.sources.try_recv().unwrap().gain, 1.0);
    }

    #[tokio::test]
    async fn test_active_pad_expires() {
        let f = fixture().await;
        let now = Instant::now();

        f.router.on_note_event(13, 64, now);
        let pad = f.router.active_pad(now).unwrap();
        assert_eq!(pad.channel, 1);
        assert_eq!(pad.velocity, 64);
        assert_eq!(pad.expires_at, now + DEFAULT_HIGHLIGHT);

        assert!(f.router.active_pad(now + Duration::from_millis(99)).is_some());
        assert!(f.router.active_pad(now + DEFAULT_HIGHLIGHT).is_none());
    }

    #[tokio::test]
    async fn test_uncached_sound_plays_once_loaded() {
        let f = fixture().await;
        let resolver = Arc::new(CountingResolver::new(Duration::ZERO));
        resolver.insert("snare.wav", wav_bytes(&[vec![1000i16; 32]], 44100).unwrap());
        let cache = Arc::new(BufferCache::new(resolver, 44100));
        let channels = Arc::new(ChannelRegistry::new(cache, Handle::current()));
        let (tx, sources) = crossbeam_channel::unbounded();
        let router = InputRouter::new(
            NoteMap::default(),
            channels.clone(),
            Arc::new(PlaybackEngine::new(tx)),
            f.pattern.clone(),
            f.transport.clone(),
            DEFAULT_HIGHLIGHT,
            Handle::current(),
        );
        channels.assign(2, ResourceRef::from("snare.wav")).unwrap();

        router.on_note_event(14, 127, Instant::now());
        eventually_async(
            || {
                let sources = sources.clone();
                async move { !sources.is_empty() }
            },
            "pad never played",
        )
        .await;
        assert_eq!(f.sources.len(), 0);
    }
}
