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

//! A pad-driven percussion step sequencer. Pad hits from a MIDI controller are played
//! immediately and, while recording, captured into a 16x16 pattern that a tempo clock
//! plays back.

pub mod audio;
pub mod cache;
pub mod channels;
pub mod config;
pub mod controller;
pub mod engine;
pub mod input;
pub mod midi;
pub mod pattern;
pub mod playback;
pub mod playsync;
pub mod project;
pub mod transport;

#[cfg(test)]
mod testutil;
