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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::ResourceRef;
use crate::channels::CHANNEL_COUNT;
use crate::pattern::{MAX_VELOCITY, STEP_COUNT};
use crate::transport::clamp_tempo;

pub mod store;

pub use store::{FileStore, MemoryStore, PersistenceStore, StoreError};

/// The version written into exported projects.
pub const VERSION: &str = "1.0.0";

/// The name used when a project is saved without one.
pub const DEFAULT_NAME: &str = "Untitled Project";

/// The name given to imported projects that do not carry one.
pub const IMPORTED_NAME: &str = "Imported Project";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ImportValidationError {
    #[error("project is not valid JSON: {0}")]
    Syntax(String),

    #[error("project is missing {0}")]
    MissingField(&'static str),

    #[error("{field} must have {expected} entries, found {found}")]
    WrongLength {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("velocity {velocity} at channel {channel}, step {step} is outside 0-127")]
    VelocityOutOfRange {
        channel: usize,
        step: usize,
        velocity: i64,
    },
}

/// A saved or exported project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub date: DateTime<Utc>,
    pub sounds: Vec<Option<ResourceRef>>,
    pub sequence: Vec<Vec<u8>>,
    pub bpm: u16,
    pub version: String,
}

/// The shape of an incoming project before validation. Every field is optional so that a
/// missing field is reported by name rather than as a generic parse failure.
#[derive(Deserialize)]
struct RawProject {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
    sounds: Option<Vec<Option<ResourceRef>>>,
    sequence: Option<Vec<Vec<i64>>>,
    bpm: Option<i64>,
    version: Option<String>,
}

impl ProjectRecord {
    /// Creates a record stamped with the current time and version.
    pub fn new(
        name: &str,
        sounds: Vec<Option<ResourceRef>>,
        sequence: Vec<Vec<u8>>,
        bpm: u16,
    ) -> ProjectRecord {
        let name = name.trim();
        ProjectRecord {
            name: if name.is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                name.to_string()
            },
            date: Utc::now(),
            sounds,
            sequence,
            bpm,
            version: VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses and validates an exported project. Sounds, sequence and bpm are required;
    /// bpm is clamped into the tempo range.
    pub fn from_json(json: &str) -> Result<ProjectRecord, ImportValidationError> {
        let raw: RawProject = serde_json::from_str(json)
            .map_err(|e| ImportValidationError::Syntax(e.to_string()))?;

        let sounds = raw
            .sounds
            .ok_or(ImportValidationError::MissingField("sounds"))?;
        let sequence = raw
            .sequence
            .ok_or(ImportValidationError::MissingField("sequence"))?;
        let bpm = raw.bpm.ok_or(ImportValidationError::MissingField("bpm"))?;

        if sounds.len() != CHANNEL_COUNT {
            return Err(ImportValidationError::WrongLength {
                field: "sounds",
                expected: CHANNEL_COUNT,
                found: sounds.len(),
            });
        }

        Ok(ProjectRecord {
            name: raw
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| IMPORTED_NAME.to_string()),
            date: raw.date.unwrap_or_else(Utc::now),
            sounds,
            sequence: validate_sequence(&sequence)?,
            bpm: clamp_tempo(bpm),
            version: raw.version.unwrap_or_else(|| VERSION.to_string()),
        })
    }
}

fn validate_sequence(sequence: &[Vec<i64>]) -> Result<Vec<Vec<u8>>, ImportValidationError> {
    if sequence.len() != CHANNEL_COUNT {
        return Err(ImportValidationError::WrongLength {
            field: "sequence",
            expected: CHANNEL_COUNT,
            found: sequence.len(),
        });
    }

    sequence
        .iter()
        .enumerate()
        .map(|(channel, row)| {
            if row.len() != STEP_COUNT {
                return Err(ImportValidationError::WrongLength {
                    field: "sequence row",
                    expected: STEP_COUNT,
                    found: row.len(),
                });
            }
            row.iter()
                .enumerate()
                .map(|(step, velocity)| {
                    u8::try_from(*velocity)
                        .ok()
                        .filter(|v| *v <= MAX_VELOCITY)
                        .ok_or(ImportValidationError::VelocityOutOfRange {
                            channel,
                            step,
                            velocity: *velocity,
                        })
                })
                .collect()
        })
        .collect()
}
