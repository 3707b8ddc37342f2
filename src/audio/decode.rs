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

//! In-memory decoding of one-shot sounds.
//!
//! Pad sounds are short, so they are decoded completely into interleaved f32 samples and,
//! where needed, brought to the output sample rate with linear interpolation.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

/// Errors produced while decoding raw bytes.
#[derive(Debug, thiserror::Error)]
pub enum SampleDecodeError {
    #[error("unrecognized audio format: {0}")]
    UnrecognizedFormat(String),

    #[error("no audio track found")]
    NoTrack,

    #[error("sample rate not specified")]
    NoSampleRate,

    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("audio error: {0}")]
    AudioError(#[from] SymphoniaError),

    #[error("no audio frames decoded")]
    Empty,
}

/// Decoded interleaved audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub samples: Vec<f32>,
    pub channel_count: u16,
    pub sample_rate: u32,
}

/// Decodes a complete audio file held in memory. The extension is only a hint for the probe.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<Decoded, SampleDecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| SampleDecodeError::UnrecognizedFormat(e.to_string()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SampleDecodeError::NoTrack)?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params.sample_rate.ok_or(SampleDecodeError::NoSampleRate)?;
    let mut channel_count = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(&params, &decoder_opts)
        .map_err(|e| SampleDecodeError::UnsupportedCodec(e.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // A corrupt packet is dropped; the rest of the sound is still usable.
                warn!(err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channel_count == 0 {
            channel_count = spec.channels.count() as u16;
        }
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if samples.is_empty() || channel_count == 0 {
        return Err(SampleDecodeError::Empty);
    }

    debug!(
        channels = channel_count,
        sample_rate,
        samples = samples.len(),
        "Decoded sound"
    );

    Ok(Decoded {
        samples,
        channel_count,
        sample_rate,
    })
}

/// Resamples interleaved audio from one sample rate to another using linear interpolation.
/// Linear interpolation is adequate for percussive one-shots.
pub fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    if source_rate == target_rate || channel_count == 0 || source_rate == 0 {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
