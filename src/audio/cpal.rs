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
use std::{error::Error, fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
#[cfg(test)]
use std::sync::Arc;
use tracing::{error, info, span, Level};

use crate::audio::mixer::{ActiveSource, AudioMixer};
use crate::audio::{Device as AudioDevice, SourceSender};
use crate::config;

/// A small wrapper around a cpal::Device with a running output stream.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The number of output channels.
    channels: u16,
    /// The sample rate of the output stream.
    sample_rate: u32,
    /// The output stream manager for continuous playback.
    output_manager: OutputManager,
}

/// Owns the thread that keeps the cpal stream alive.
struct OutputManager {
    /// Channel for sending new audio sources to the stream callback.
    source_tx: SourceSender,
    /// Channel receiver handed to the stream callback.
    source_rx: crossbeam_channel::Receiver<ActiveSource>,
    /// Dropping this ends the output thread.
    shutdown_tx: Option<crossbeam_channel::Sender<()>>,
    /// Handle to the output thread.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, SampleRate={}) ({})",
            self.name,
            self.channels,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        // Closing the shutdown channel wakes the output thread, which drops the stream.
        self.shutdown_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl OutputManager {
    fn new() -> OutputManager {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        OutputManager {
            source_tx,
            source_rx,
            shutdown_tx: None,
            output_thread: None,
        }
    }

    /// Starts the output thread. The cpal stream is created inside the thread and lives
    /// until the manager is dropped.
    fn start_output_thread(
        &mut self,
        device: cpal::Device,
        stream_config: cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
    ) -> Result<(), Box<dyn Error>> {
        let mixer = AudioMixer::new(stream_config.channels, stream_config.sample_rate.0);
        let source_rx = self.source_rx.clone();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output (cpal)");
            let _enter = span.enter();

            let stream =
                match build_stream(&device, &stream_config, sample_format, mixer, source_rx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.to_string()));
                return;
            }
            info!("CPAL output stream started successfully");
            let _ = ready_tx.send(Ok(()));

            // Blocks until the sender is dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
            info!("CPAL output stream stopped");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("failed to start output stream: {}", e).into()),
            Err(_) => return Err("audio output thread exited before starting".into()),
        }

        self.shutdown_tx = Some(shutdown_tx);
        self.output_thread = Some(output_thread);
        Ok(())
    }
}

/// Builds an output stream for the device's native sample format.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: AudioMixer,
    source_rx: crossbeam_channel::Receiver<ActiveSource>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(device, config, mixer, source_rx)?,
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(device, config, mixer, source_rx)?,
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(device, config, mixer, source_rx)?,
        other => return Err(format!("unsupported sample format {:?}", other).into()),
    };
    Ok(stream)
}

/// The stream callback drains new sources, mixes into a scratch buffer and converts to the
/// device format.
fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: AudioMixer,
    source_rx: crossbeam_channel::Receiver<ActiveSource>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(source) = source_rx.try_recv() {
                mixer.add_source(source);
            }
            scratch.resize(data.len(), 0.0);
            mixer.process_into_output(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!(err = %err, "CPAL output stream error"),
        None,
    )
}

/// A found output device along with its default configuration.
struct Candidate {
    name: String,
    host_id: cpal::HostId,
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

/// Lists output devices across all hosts.
fn list_candidates() -> Result<Vec<Candidate>, Box<dyn Error>> {
    let mut candidates = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(config) = device.default_output_config() else {
                continue;
            };
            let Ok(name) = device.name() else {
                continue;
            };
            candidates.push(Candidate {
                name,
                host_id,
                device,
                config,
            });
        }
    }

    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidates)
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(list_candidates()?
            .into_iter()
            .map(|candidate| {
                let device: Box<dyn AudioDevice> = Box::new(Device {
                    name: candidate.name,
                    host_id: candidate.host_id,
                    channels: candidate.config.channels(),
                    sample_rate: candidate.config.sample_rate().0,
                    output_manager: OutputManager::new(),
                });
                device
            })
            .collect())
    }

    /// Gets the given cpal device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let candidate = list_candidates()?
            .into_iter()
            .find(|candidate| candidate.name.trim() == name)
            .ok_or_else(|| format!("no device found with name {}", name))?;

        let sample_rate = config
            .requested_sample_rate()
            .unwrap_or(candidate.config.sample_rate().0);
        let channels = candidate.config.channels();
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            device = candidate.name,
            channels,
            sample_rate,
            format = ?candidate.config.sample_format(),
            "Opening audio device"
        );

        let mut output_manager = OutputManager::new();
        output_manager.start_output_thread(
            candidate.device,
            stream_config,
            candidate.config.sample_format(),
        )?;

        Ok(Device {
            name: candidate.name,
            host_id: candidate.host_id,
            channels,
            sample_rate,
            output_manager,
        })
    }
}

impl AudioDevice for Device {
    fn source_sender(&self) -> SourceSender {
        self.output_manager.source_tx.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
