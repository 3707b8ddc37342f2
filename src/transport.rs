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

//! The transport: play, stop and record state plus the step clock.
//!
//! While playing, a recurring tick advances the current step and triggers every non-empty
//! cell in the new column. Changing tempo or quantization swaps the tick without touching
//! the current step. Stopping cancels future ticks only; voices and loads that were already
//! dispatched carry on.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cache::ResourceRef;
use crate::channels::ChannelRegistry;
use crate::pattern::{Pattern, STEP_COUNT};
use crate::playback::PlaybackEngine;

pub mod clock;
pub mod metronome;

pub use clock::{Clock, TickFn, TickHandle, TokioClock};
pub use metronome::Metronome;

pub const MIN_TEMPO: u16 = 40;
pub const MAX_TEMPO: u16 = 240;
pub const DEFAULT_TEMPO: u16 = 120;

/// Clamps a requested tempo into the supported range.
pub fn clamp_tempo(bpm: i64) -> u16 {
    bpm.clamp(MIN_TEMPO as i64, MAX_TEMPO as i64) as u16
}

/// How many steps make up a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    Quarter,
    Eighth,
    #[default]
    Sixteenth,
}

impl Quantization {
    /// The fraction of a beat that one step lasts.
    pub fn factor(&self) -> f64 {
        match self {
            Quantization::Quarter => 1.0,
            Quantization::Eighth => 0.5,
            Quantization::Sixteenth => 0.25,
        }
    }

    /// The time between ticks at the given tempo.
    pub fn tick_interval(&self, tempo: u16) -> Duration {
        Duration::from_secs_f64(60.0 / tempo.max(1) as f64 * self.factor())
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quantization::Quarter => "quarter",
            Quantization::Eighth => "eighth",
            Quantization::Sixteenth => "sixteenth",
        })
    }
}

impl FromStr for Quantization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quarter" | "4" | "1/4" => Ok(Quantization::Quarter),
            "eighth" | "8" | "1/8" => Ok(Quantization::Eighth),
            "sixteenth" | "16" | "1/16" => Ok(Quantization::Sixteenth),
            other => Err(format!("unknown quantization {}", other)),
        }
    }
}

/// What happens to a hit whose sound is still decoding when its step comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LateTriggerPolicy {
    /// Play the hit as soon as the sound arrives, even if the step has passed.
    #[default]
    Fire,
    /// Drop the hit; the load still completes so the next pass plays it.
    Skip,
}

/// The state the UI reads back.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportState {
    pub tempo: u16,
    pub quantization: Quantization,
    pub playing: bool,
    pub recording: bool,
    pub current_step: usize,
    pub metronome: bool,
}

impl TransportState {
    pub fn tick_interval(&self) -> Duration {
        self.quantization.tick_interval(self.tempo)
    }
}

impl Default for TransportState {
    fn default() -> Self {
        TransportState {
            tempo: DEFAULT_TEMPO,
            quantization: Quantization::Sixteenth,
            playing: false,
            recording: false,
            current_step: 0,
            metronome: true,
        }
    }
}

/// Does the work of a single tick.
pub struct StepSequencer {
    state: Arc<Mutex<TransportState>>,
    pattern: Arc<RwLock<Pattern>>,
    channels: Arc<ChannelRegistry>,
    playback: Arc<PlaybackEngine>,
    metronome: Metronome,
    late_triggers: LateTriggerPolicy,
    runtime: Handle,
}

impl StepSequencer {
    pub fn new(
        initial: TransportState,
        pattern: Arc<RwLock<Pattern>>,
        channels: Arc<ChannelRegistry>,
        playback: Arc<PlaybackEngine>,
        metronome: Metronome,
        late_triggers: LateTriggerPolicy,
        runtime: Handle,
    ) -> StepSequencer {
        StepSequencer {
            state: Arc::new(Mutex::new(initial)),
            pattern,
            channels,
            playback,
            metronome,
            late_triggers,
            runtime,
        }
    }

    /// Advances the step and triggers the metronome and every active cell in the new column.
    pub fn on_tick(&self) {
        let (step, metronome) = {
            let mut state = self.state.lock();
            if !state.playing {
                return;
            }
            state.current_step = (state.current_step + 1) % STEP_COUNT;
            (state.current_step, state.metronome)
        };

        if metronome {
            if let Some(gain) = Metronome::gain_for_step(step) {
                match self.metronome.click(self.channels.cache()) {
                    Some(click) => {
                        self.playback.trigger_with_gain(&click, gain);
                    }
                    None => self.warm_metronome(),
                }
            }
        }

        let column = self.pattern.read().column(step);
        for (channel, velocity) in column.into_iter().enumerate() {
            if velocity == 0 {
                continue;
            }
            let Some(reference) = self.channels.resolve(channel) else {
                continue;
            };
            self.trigger_cell(channel, step, reference, velocity);
        }
    }

    fn trigger_cell(&self, channel: usize, step: usize, reference: ResourceRef, velocity: u8) {
        let cache = self.channels.cache().clone();
        if let Some(buffer) = cache.peek(&reference) {
            self.playback.trigger(&buffer, velocity);
            return;
        }

        let playback = self.playback.clone();
        let policy = self.late_triggers;
        debug!(channel, step, reference = %reference, policy = ?policy, "Sound not cached");
        self.runtime.spawn(async move {
            match cache.load(&reference).await {
                Ok(buffer) if policy == LateTriggerPolicy::Fire => {
                    debug!(channel, step, "Firing late trigger");
                    playback.trigger(&buffer, velocity);
                }
                Ok(_) => {}
                Err(e) => warn!(channel, step, err = %e, "Unable to trigger cell"),
            }
        });
    }

    fn warm_metronome(&self) {
        if let Some(reference) = self.metronome.reference() {
            let cache = self.channels.cache().clone();
            let reference = reference.clone();
            self.runtime.spawn(async move {
                if let Err(e) = cache.load(&reference).await {
                    warn!(err = %e, "Unable to load metronome sound");
                }
            });
        }
    }
}

pub struct Transport {
    state: Arc<Mutex<TransportState>>,
    /// The single active tick, if playing. Always locked before `state`.
    ticker: Mutex<Option<TickHandle>>,
    clock: Arc<dyn Clock>,
    sequencer: Arc<StepSequencer>,
}

impl Transport {
    pub fn new(sequencer: StepSequencer, clock: Arc<dyn Clock>) -> Transport {
        Transport {
            state: sequencer.state.clone(),
            ticker: Mutex::new(None),
            clock,
            sequencer: Arc::new(sequencer),
        }
    }

    /// The live transport state, shared with the input router.
    pub fn shared_state(&self) -> Arc<Mutex<TransportState>> {
        self.state.clone()
    }

    /// Returns a snapshot of the transport state.
    pub fn state(&self) -> TransportState {
        self.state.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().recording
    }

    pub fn current_step(&self) -> usize {
        self.state.lock().current_step
    }

    pub fn tick_interval(&self) -> Duration {
        self.state.lock().tick_interval()
    }

    /// Starts playback from step 0. Does nothing if already playing.
    pub fn play(&self) {
        let mut ticker = self.ticker.lock();
        self.start(&mut ticker);
    }

    fn start(&self, ticker: &mut Option<TickHandle>) {
        let interval = {
            let mut state = self.state.lock();
            if state.playing {
                return;
            }
            state.playing = true;
            state.current_step = 0;
            state.tick_interval()
        };

        self.sequencer.channels.preload_all();
        self.install(ticker, interval);
        info!(interval_ms = interval.as_millis() as u64, "Transport playing");
    }

    /// Stops playback. The current step is kept and recording is disarmed.
    pub fn stop(&self) {
        let mut ticker = self.ticker.lock();
        if let Some(mut handle) = ticker.take() {
            handle.cancel();
        }

        let mut state = self.state.lock();
        if state.playing {
            info!(step = state.current_step, "Transport stopped");
        }
        state.playing = false;
        state.recording = false;
    }

    pub fn toggle_playing(&self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.play();
        }
    }

    /// Flips the recording flag, returning the new value. Arming while stopped also starts
    /// playback; disarming leaves playback running.
    pub fn toggle_recording(&self) -> bool {
        let mut ticker = self.ticker.lock();
        let (recording, start) = {
            let mut state = self.state.lock();
            state.recording = !state.recording;
            (state.recording, state.recording && !state.playing)
        };
        info!(recording, "Recording toggled");

        if start {
            self.start(&mut ticker);
        }
        recording
    }

    /// Sets the tempo, clamped to the supported range. Returns the tempo actually used.
    pub fn set_tempo(&self, bpm: i64) -> u16 {
        let tempo = clamp_tempo(bpm);
        self.update(|state| state.tempo = tempo);
        info!(tempo, "Tempo set");
        tempo
    }

    pub fn set_quantization(&self, quantization: Quantization) {
        self.update(|state| state.quantization = quantization);
        info!(quantization = %quantization, "Quantization set");
    }

    pub fn set_metronome(&self, enabled: bool) {
        self.state.lock().metronome = enabled;
        debug!(enabled, "Metronome set");
    }

    /// Moves the playhead back to the first step.
    pub fn reset_step(&self) {
        self.state.lock().current_step = 0;
    }

    /// Applies a timing change and, while playing, swaps the tick for one at the new interval.
    fn update(&self, change: impl FnOnce(&mut TransportState)) {
        let mut ticker = self.ticker.lock();
        let (playing, interval) = {
            let mut state = self.state.lock();
            change(&mut state);
            (state.playing, state.tick_interval())
        };

        if playing {
            self.install(&mut ticker, interval);
            debug!(interval_ms = interval.as_millis() as u64, "Tick replaced");
        }
    }

    fn install(&self, ticker: &mut Option<TickHandle>, interval: Duration) {
        if let Some(mut old) = ticker.take() {
            old.cancel();
        }
        let sequencer = self.sequencer.clone();
        let tick: TickFn = Arc::new(move || sequencer.on_tick());
        *ticker = Some(self.clock.schedule(interval, tick));
    }
}
