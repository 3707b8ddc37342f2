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
use std::sync::Arc;
use std::time::Instant;

use midly::{live::LiveEvent, MidiMessage};
use tokio::{sync::mpsc::Receiver, task::JoinHandle};
use tracing::{debug, info, span, Instrument, Level};

use super::{Hit, InputRouter};

/// A pad hit parsed from raw MIDI. The channel is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
}

/// Parses raw MIDI into a hit. Only Note On with a non-zero velocity counts; Note Off and
/// Note On with velocity 0 are releases.
pub fn parse_note_on(raw_event: &[u8], channel_filter: Option<u8>) -> Option<NoteEvent> {
    let event = match LiveEvent::parse(raw_event) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = ?e, "Failed to parse MIDI event");
            return None;
        }
    };

    let LiveEvent::Midi { channel, message } = event else {
        return None;
    };
    let channel = u8::from(channel) + 1;
    if channel_filter.is_some_and(|filter| filter != channel) {
        return None;
    }

    match message {
        MidiMessage::NoteOn { key, vel } if u8::from(vel) > 0 => Some(NoteEvent {
            channel,
            note: u8::from(key),
            velocity: u8::from(vel),
        }),
        _ => None,
    }
}

/// Feeds raw MIDI from an input device into the input router.
pub struct MidiListener {
    router: Arc<InputRouter>,
    channel_filter: Option<u8>,
}

impl MidiListener {
    pub fn new(router: Arc<InputRouter>, channel_filter: Option<u8>) -> MidiListener {
        MidiListener {
            router,
            channel_filter,
        }
    }

    /// Routes a single raw event.
    pub fn handle(&self, raw_event: &[u8]) -> Option<Hit> {
        let event = parse_note_on(raw_event, self.channel_filter)?;
        debug!(
            channel = event.channel,
            note = event.note,
            velocity = event.velocity,
            "Pad hit"
        );
        self.router
            .on_note_event(event.note, event.velocity, Instant::now())
    }

    /// Routes events until the sending side closes.
    pub fn spawn(self, mut events: Receiver<Vec<u8>>) -> JoinHandle<()> {
        let span = span!(Level::INFO, "midi listener");
        tokio::spawn(
            async move {
                info!(channel = ?self.channel_filter, "Listening for pad hits");
                while let Some(raw_event) = events.recv().await {
                    self.handle(&raw_event);
                }
                info!("MIDI input closed");
            }
            .instrument(span),
        )
    }
}
