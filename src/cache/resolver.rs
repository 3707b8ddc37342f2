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
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::ResourceRef;

/// Turns a resource reference into raw bytes. Implementations may block; the cache always
/// calls them from a blocking worker.
pub trait ResourceResolver: Send + Sync + 'static {
    fn fetch(&self, reference: &ResourceRef) -> io::Result<Vec<u8>>;
}

/// Resolves references against the local filesystem. Relative references are joined to the
/// base path, and a leading `file://` is accepted.
pub struct FileResolver {
    base_path: PathBuf,
}

impl FileResolver {
    pub fn new(base_path: &Path) -> FileResolver {
        FileResolver {
            base_path: base_path.to_path_buf(),
        }
    }

    /// Returns the path that the given reference resolves to.
    pub fn path_for(&self, reference: &ResourceRef) -> io::Result<PathBuf> {
        let raw = reference.as_str();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("remote references are not supported: {}", raw),
            ));
        }

        let raw = raw.strip_prefix("file://").unwrap_or(raw);
        let path = Path::new(raw);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.base_path.join(path))
        }
    }
}

impl ResourceResolver for FileResolver {
    fn fetch(&self, reference: &ResourceRef) -> io::Result<Vec<u8>> {
        let path = self.path_for(reference)?;
        debug!(path = ?path, "Reading sound");
        fs::read(&path).map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
    }
}
