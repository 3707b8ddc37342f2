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

//! Decoded audio buffers, keyed by resource reference.
//!
//! Buffers are decoded once and shared read-only for the life of the process. Concurrent
//! requests for the same reference share a single decode through the in-flight map, and a
//! failed decode is never cached so a later request tries again.

use std::{collections::HashMap, fmt, path::Path, sync::Arc, time::Duration};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::audio::decode::{decode_bytes, transcode_samples, SampleDecodeError};

pub mod resolver;

pub use resolver::{FileResolver, ResourceResolver};

/// An opaque locator for an audio asset. Usually a path relative to the sounds directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(reference: impl Into<String>) -> ResourceRef {
        ResourceRef(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file extension of the reference, used as a format hint when decoding.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.0).extension().and_then(|ext| ext.to_str())
    }
}

impl From<&str> for ResourceRef {
    fn from(value: &str) -> Self {
        ResourceRef::new(value)
    }
}

impl From<String> for ResourceRef {
    fn from(value: String) -> Self {
        ResourceRef(value)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded, interleaved audio at the output sample rate. Cloning is cheap; the sample data
/// is shared.
#[derive(Clone)]
pub struct Buffer {
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl Buffer {
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Buffer {
        Buffer {
            data: Arc::new(samples),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames in the buffer.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns true if both buffers share the same sample data.
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// A failed load. Failures are never cached.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unable to fetch {reference}: {reason}")]
    Fetch { reference: String, reason: String },

    #[error("unable to decode {reference}: {reason}")]
    Undecodable { reference: String, reason: String },

    #[error("{reference} contains no audio")]
    Empty { reference: String },

    #[error("decode of {reference} was abandoned")]
    Abandoned { reference: String },
}

type LoadResult = Result<Buffer, DecodeError>;

enum Request {
    Ready(Buffer),
    Pending(watch::Receiver<Option<LoadResult>>),
}

/// The process-wide cache of decoded buffers.
pub struct BufferCache {
    resolver: Arc<dyn ResourceResolver>,
    /// Decoded audio is converted to this rate so the mixer never resamples.
    target_sample_rate: u32,
    cache: RwLock<HashMap<ResourceRef, Buffer>>,
    /// Decodes that have been started but not finished. Always locked before `cache`.
    in_flight: Mutex<HashMap<ResourceRef, watch::Receiver<Option<LoadResult>>>>,
}

impl BufferCache {
    pub fn new(resolver: Arc<dyn ResourceResolver>, target_sample_rate: u32) -> BufferCache {
        BufferCache {
            resolver,
            target_sample_rate,
            cache: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached buffer without loading anything.
    pub fn peek(&self, reference: &ResourceRef) -> Option<Buffer> {
        self.cache.read().get(reference).cloned()
    }

    /// Returns the buffer for the reference, decoding it if needed. Callers racing on the same
    /// reference share one decode and receive the same buffer.
    pub async fn load(self: &Arc<Self>, reference: &ResourceRef) -> Result<Buffer, DecodeError> {
        if let Some(buffer) = self.peek(reference) {
            debug!(reference = %reference, "Using cached buffer");
            return Ok(buffer);
        }

        let mut rx = match self.request(reference) {
            Request::Ready(buffer) => return Ok(buffer),
            Request::Pending(rx) => rx,
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(DecodeError::Abandoned {
                reference: reference.to_string(),
            })
        })
    }

    /// Joins an in-flight decode or starts a new one.
    fn request(self: &Arc<Self>, reference: &ResourceRef) -> Request {
        let mut in_flight = self.in_flight.lock();

        if let Some(rx) = in_flight.get(reference) {
            // A closed sender means the worker died without reporting.
            if rx.has_changed().is_ok() {
                return Request::Pending(rx.clone());
            }
            warn!(reference = %reference, "Replacing abandoned decode");
            in_flight.remove(reference);
        }

        // The decode may have finished between the caller's peek and taking the lock.
        if let Some(buffer) = self.cache.read().get(reference) {
            return Request::Ready(buffer.clone());
        }

        let (tx, rx) = watch::channel(None);
        in_flight.insert(reference.clone(), rx.clone());
        drop(in_flight);

        let cache = self.clone();
        let reference = reference.clone();
        tokio::task::spawn_blocking(move || {
            let result = cache.fetch_and_decode(&reference);
            cache.complete(&reference, result, tx);
        });

        Request::Pending(rx)
    }

    fn complete(
        &self,
        reference: &ResourceRef,
        result: LoadResult,
        tx: watch::Sender<Option<LoadResult>>,
    ) {
        match &result {
            Ok(buffer) => {
                self.cache.write().insert(reference.clone(), buffer.clone());
            }
            Err(e) => warn!(reference = %reference, err = %e, "Failed to load sound"),
        }
        self.in_flight.lock().remove(reference);
        tx.send_replace(Some(result));
    }

    fn fetch_and_decode(&self, reference: &ResourceRef) -> LoadResult {
        let bytes = self
            .resolver
            .fetch(reference)
            .map_err(|e| DecodeError::Fetch {
                reference: reference.to_string(),
                reason: e.to_string(),
            })?;

        let decoded = decode_bytes(bytes, reference.extension()).map_err(|e| match e {
            SampleDecodeError::Empty => DecodeError::Empty {
                reference: reference.to_string(),
            },
            e => DecodeError::Undecodable {
                reference: reference.to_string(),
                reason: e.to_string(),
            },
        })?;

        if decoded.sample_rate != self.target_sample_rate {
            debug!(
                reference = %reference,
                source_rate = decoded.sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sound"
            );
        }
        let samples = transcode_samples(
            &decoded.samples,
            decoded.channel_count,
            decoded.sample_rate,
            self.target_sample_rate,
        );
        let buffer = Buffer::new(samples, decoded.channel_count, self.target_sample_rate);

        info!(
            reference = %reference,
            channels = buffer.channel_count(),
            duration_ms = buffer.duration().as_millis() as u64,
            memory_kb = buffer.memory_size() / 1024,
            "Sound loaded"
        );

        Ok(buffer)
    }

    /// Returns the total memory used by cached buffers.
    pub fn memory_usage(&self) -> usize {
        self.cache.read().values().map(Buffer::memory_size).sum()
    }

    /// Returns the number of cached buffers.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }
}

impl fmt::Debug for BufferCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferCache")
            .field("cached_buffers", &self.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}
