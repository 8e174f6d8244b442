use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use tracing::{debug, warn};

use crate::error::Result;

/// Read-only, reference-counted view over a file's bytes.
///
/// Clones share one mapping; it is unmapped when the last clone drops.
/// A view opened with [`MappedFile::open_temporary`] also deletes its file
/// at that point, which is how inflated archive copies are cleaned up once
/// the response that serves them is finished or abandoned.
#[derive(Clone)]
pub struct MappedFile {
    inner: Arc<Inner>,
}

struct Inner {
    // None for zero-length files, which cannot be mapped.
    map: Option<Mmap>,
    path: PathBuf,
    remove_on_drop: bool,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        Self::map(path, false)
    }

    /// Maps `path` and deletes it when the last holder releases the view.
    pub fn open_temporary(path: &Path) -> Result<Self> {
        Self::map(path, true)
    }

    fn map(path: &Path, remove_on_drop: bool) -> Result<Self> {
        let mut inner = Inner {
            map: None,
            path: path.to_path_buf(),
            remove_on_drop,
        };

        let file = File::open(path)?;
        if file.metadata()?.len() > 0 {
            // Safety: mapped read-only. Stored objects are replaced by
            // renaming a new file over them, so a live mapping keeps the
            // old inode; inflated copies are private to this view.
            inner.map = Some(unsafe { Mmap::map(&file)? });
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.map.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_temporary(&self) -> bool {
        self.inner.remove_on_drop
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.inner.path)
            .field("len", &self.len())
            .field("temporary", &self.inner.remove_on_drop)
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.map.take();
        if self.remove_on_drop {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "Removed temporary file"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove temporary file"),
            }
        }
    }
}
