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

use std::{error::Error, fs, io::Cursor, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Encodes 16-bit PCM into an in-memory WAV file. Each inner vector is one channel.
pub fn wav_bytes(channels: &[Vec<i16>], sample_rate: u32) -> Result<Vec<u8>, Box<dyn Error>> {
    let num_channels = channels.len();
    assert!(num_channels > 0, "At least one channel is required!");
    let frames = channels[0].len();
    assert!(
        channels.iter().all(|c| c.len() == frames),
        "Channels must have the same length!"
    );

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: num_channels as u16,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )?;

        for frame in 0..frames {
            for channel in channels {
                writer.write_sample(channel[frame])?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Writes a 16-bit PCM WAV file.
pub fn write_wav(
    path: &Path,
    channels: &[Vec<i16>],
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    fs::write(path, wav_bytes(channels, sample_rate)?)?;
    Ok(())
}
