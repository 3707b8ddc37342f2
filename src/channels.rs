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

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cache::{BufferCache, ResourceRef};

/// The number of sound slots.
pub const CHANNEL_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {0} is outside 0..16")]
    InvalidChannel(usize),

    #[error("expected 16 sounds, found {0}")]
    WrongLength(usize),
}

/// Maps the fixed channel slots to sound references. Assigning a sound starts decoding it in
/// the background so the first hit finds it cached.
pub struct ChannelRegistry {
    slots: RwLock<[Option<ResourceRef>; CHANNEL_COUNT]>,
    cache: Arc<BufferCache>,
    runtime: Handle,
}

impl ChannelRegistry {
    pub fn new(cache: Arc<BufferCache>, runtime: Handle) -> ChannelRegistry {
        ChannelRegistry {
            slots: RwLock::new(Default::default()),
            cache,
            runtime,
        }
    }

    fn check(channel: usize) -> Result<(), ChannelError> {
        if channel >= CHANNEL_COUNT {
            return Err(ChannelError::InvalidChannel(channel));
        }
        Ok(())
    }

    /// Assigns a sound to a channel, replacing any previous one, and starts preloading it.
    pub fn assign(&self, channel: usize, reference: ResourceRef) -> Result<(), ChannelError> {
        Self::check(channel)?;
        info!(channel, reference = %reference, "Assigning sound");
        self.slots.write()[channel] = Some(reference.clone());
        self.preload(reference);
        Ok(())
    }

    /// Returns the sound assigned to a channel. Out of range channels have no sound.
    pub fn resolve(&self, channel: usize) -> Option<ResourceRef> {
        self.slots.read().get(channel).cloned().flatten()
    }

    /// Removes a channel's sound.
    pub fn clear(&self, channel: usize) -> Result<(), ChannelError> {
        Self::check(channel)?;
        debug!(channel, "Clearing sound");
        self.slots.write()[channel] = None;
        Ok(())
    }

    /// Returns a snapshot of every slot.
    pub fn sounds(&self) -> Vec<Option<ResourceRef>> {
        self.slots.read().to_vec()
    }

    /// Replaces every slot at once and preloads the new sounds.
    pub fn replace_all(&self, sounds: &[Option<ResourceRef>]) -> Result<(), ChannelError> {
        if sounds.len() != CHANNEL_COUNT {
            return Err(ChannelError::WrongLength(sounds.len()));
        }

        {
            let mut slots = self.slots.write();
            for (slot, sound) in slots.iter_mut().zip(sounds.iter()) {
                *slot = sound.clone();
            }
        }
        self.preload_all();
        Ok(())
    }

    /// Starts loading every assigned sound that is not cached yet.
    pub fn preload_all(&self) {
        for reference in self.sounds().into_iter().flatten() {
            if self.cache.peek(&reference).is_none() {
                self.preload(reference);
            }
        }
    }

    fn preload(&self, reference: ResourceRef) {
        let cache = self.cache.clone();
        self.runtime.spawn(async move {
            if let Err(e) = cache.load(&reference).await {
                warn!(reference = %reference, err = %e, "Preload failed");
            }
        });
    }

    pub fn cache(&self) -> &Arc<BufferCache> {
        &self.cache
    }
}
