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
use std::fmt;

use crate::channels::CHANNEL_COUNT;

/// The number of steps in one pattern cycle.
pub const STEP_COUNT: usize = 16;

/// The highest velocity a cell can hold.
pub const MAX_VELOCITY: u8 = 127;

/// The velocity written when a cell is toggled on.
pub const DEFAULT_VELOCITY: u8 = 100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("cell ({channel}, {step}) is outside the 16x16 grid")]
    InvalidCellAddress { channel: usize, step: usize },

    #[error("velocity {0} exceeds 127")]
    InvalidVelocity(u32),

    #[error("pattern must be 16 rows of 16 steps: {0}")]
    Shape(String),
}

/// A grid of velocities, one row per channel and one column per step. A velocity of 0 is an
/// empty cell.
#[derive(Clone, PartialEq, Eq)]
pub struct Pattern {
    cells: [[u8; STEP_COUNT]; CHANNEL_COUNT],
}

impl Pattern {
    /// Creates an empty pattern.
    pub fn new() -> Pattern {
        Pattern {
            cells: [[0; STEP_COUNT]; CHANNEL_COUNT],
        }
    }

    fn check(channel: usize, step: usize) -> Result<(), PatternError> {
        if channel >= CHANNEL_COUNT || step >= STEP_COUNT {
            return Err(PatternError::InvalidCellAddress { channel, step });
        }
        Ok(())
    }

    pub fn get(&self, channel: usize, step: usize) -> Result<u8, PatternError> {
        Self::check(channel, step)?;
        Ok(self.cells[channel][step])
    }

    /// Writes a cell. Out of range addresses and velocities leave the grid untouched.
    pub fn set(&mut self, channel: usize, step: usize, velocity: u32) -> Result<(), PatternError> {
        Self::check(channel, step)?;
        if velocity > MAX_VELOCITY as u32 {
            return Err(PatternError::InvalidVelocity(velocity));
        }
        self.cells[channel][step] = velocity as u8;
        Ok(())
    }

    /// Switches a cell between empty and the default velocity, returning the new velocity.
    pub fn toggle(&mut self, channel: usize, step: usize) -> Result<u8, PatternError> {
        Self::check(channel, step)?;
        let cell = &mut self.cells[channel][step];
        *cell = if *cell > 0 { 0 } else { DEFAULT_VELOCITY };
        Ok(*cell)
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells = [[0; STEP_COUNT]; CHANNEL_COUNT];
    }

    /// Empties one channel's row.
    pub fn clear_channel(&mut self, channel: usize) -> Result<(), PatternError> {
        Self::check(channel, 0)?;
        self.cells[channel] = [0; STEP_COUNT];
        Ok(())
    }

    /// Returns every channel's velocity at the given step.
    pub fn column(&self, step: usize) -> [u8; CHANNEL_COUNT] {
        let mut column = [0; CHANNEL_COUNT];
        if step < STEP_COUNT {
            for (channel, row) in self.cells.iter().enumerate() {
                column[channel] = row[step];
            }
        }
        column
    }

    /// Returns the grid as nested rows, the layout used by project records.
    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells.iter().map(|row| row.to_vec()).collect()
    }

    /// Builds a pattern from nested rows, validating the shape and every velocity.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Pattern, PatternError> {
        if rows.len() != CHANNEL_COUNT {
            return Err(PatternError::Shape(format!("found {} rows", rows.len())));
        }

        let mut pattern = Pattern::new();
        for (channel, row) in rows.iter().enumerate() {
            if row.len() != STEP_COUNT {
                return Err(PatternError::Shape(format!(
                    "row {} has {} steps",
                    channel,
                    row.len()
                )));
            }
            for (step, velocity) in row.iter().enumerate() {
                pattern.set(channel, step, *velocity as u32)?;
            }
        }
        Ok(pattern)
    }

    /// Returns the number of non-empty cells.
    pub fn active_cells(&self) -> usize {
        self.cells.iter().flatten().filter(|v| **v > 0).count()
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("active_cells", &self.active_cells())
            .finish()
    }
}

/// Renders the grid one channel per line, `x` for a loud hit, `o` for a soft one.
impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (channel, row) in self.cells.iter().enumerate() {
            write!(f, "{:>2} |", channel)?;
            for (step, velocity) in row.iter().enumerate() {
                if step > 0 && step % 4 == 0 {
                    write!(f, " ")?;
                }
                let mark = match velocity {
                    0 => '.',
                    1..=63 => 'o',
                    _ => 'x',
                };
                write!(f, "{}", mark)?;
            }
            writeln!(f, "|")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_then_read_every_cell() {
        let mut pattern = Pattern::new();
        for channel in 0..CHANNEL_COUNT {
            for step in 0..STEP_COUNT {
                let velocity = ((channel * STEP_COUNT + step) % 128) as u32;
                pattern.set(channel, step, velocity).unwrap();
                assert_eq!(pattern.get(channel, step).unwrap() as u32, velocity);
            }
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut pattern = Pattern::new();
        pattern.set(3, 3, 90).unwrap();
        let before = pattern.clone();

        assert_eq!(
            pattern.set(16, 0, 100),
            Err(PatternError::InvalidCellAddress {
                channel: 16,
                step: 0
            })
        );
        assert_eq!(
            pattern.set(0, 16, 100),
            Err(PatternError::InvalidCellAddress {
                channel: 0,
                step: 16
            })
        );
        assert_eq!(
            pattern.set(0, 0, 128),
            Err(PatternError::InvalidVelocity(128))
        );
        assert!(pattern.get(16, 16).is_err());
        assert_eq!(pattern, before);
    }

    #[test]
    fn test_toggle() {
        let mut pattern = Pattern::new();
        assert_eq!(pattern.toggle(2, 5).unwrap(), DEFAULT_VELOCITY);
        assert_eq!(pattern.toggle(2, 5).unwrap(), 0);

        pattern.set(2, 5, 40).unwrap();
        assert_eq!(pattern.toggle(2, 5).unwrap(), 0);
    }

    #[test]
    fn test_clear_channel_and_clear() {
        let mut pattern = Pattern::new();
        pattern.set(1, 0, 100).unwrap();
        pattern.set(1, 15, 100).unwrap();
        pattern.set(2, 7, 100).unwrap();

        pattern.clear_channel(1).unwrap();
        assert_eq!(pattern.active_cells(), 1);
        assert!(pattern.clear_channel(16).is_err());

        pattern.clear();
        assert_eq!(pattern.active_cells(), 0);
    }

    #[test]
    fn test_column() {
        let mut pattern = Pattern::new();
        pattern.set(0, 4, 100).unwrap();
        pattern.set(9, 4, 20).unwrap();

        let column = pattern.column(4);
        assert_eq!(column[0], 100);
        assert_eq!(column[9], 20);
        assert_eq!(column.iter().filter(|v| **v > 0).count(), 2);
    }

    #[test]
    fn test_rows_round_trip() {
        let mut pattern = Pattern::new();
        pattern.set(15, 15, 127).unwrap();

        let rows = pattern.rows();
        assert_eq!(Pattern::from_rows(&rows).unwrap(), pattern);

        assert!(matches!(
            Pattern::from_rows(&rows[..15]),
            Err(PatternError::Shape(_))
        ));
        let mut bad = rows.clone();
        bad[3] = vec![0; 15];
        assert!(matches!(
            Pattern::from_rows(&bad),
            Err(PatternError::Shape(_))
        ));
        bad[3] = vec![0; 16];
        bad[3][0] = 200;
        assert_eq!(
            Pattern::from_rows(&bad),
            Err(PatternError::InvalidVelocity(200))
        );
    }

    #[test]
    fn test_display() {
        let mut pattern = Pattern::new();
        pattern.set(0, 0, 100).unwrap();
        pattern.set(0, 4, 30).unwrap();

        let rendered = pattern.to_string();
        let first = rendered.lines().next().unwrap();
        assert_eq!(first, " 0 |x... o... .... ....|");
        assert_eq!(rendered.lines().count(), 16);
    }
}
