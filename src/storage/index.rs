//! Concurrent object index with JSON persistence
//!
//! The table is a `HashMap<url, ObjectRecord>` behind a reader/writer lock.
//! Lookups take the read lock; `insert`/`update` take the write lock only
//! long enough to touch the map and then flush the whole table to disk.
//!
//! # Durability
//!
//! A flush snapshots the table under the read lock and writes the file
//! *outside* it (temp file + rename, so readers of the file never see a
//! torn write). Flushes are serialized among themselves, and each mutation
//! flushes after its own write, so once `insert` returns `Ok` the file holds
//! that record or a newer value for the same key. Between the map write and
//! the rename a concurrent reader of the *file* (for example a second
//! process calling [`StorageIndex::init_load`]) may still observe the
//! previous snapshot. In-memory readers always see the new record.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::record::ObjectRecord;

pub struct StorageIndex {
    storage_file: PathBuf,
    table: RwLock<HashMap<String, ObjectRecord>>,
    /// Serializes snapshot + write so the newest snapshot lands last.
    flush_lock: Mutex<()>,
}

impl StorageIndex {
    /// Creates an index backed by `storage_file` without reading it.
    pub fn empty(storage_file: impl Into<PathBuf>) -> Self {
        Self {
            storage_file: storage_file.into(),
            table: RwLock::new(HashMap::new()),
            flush_lock: Mutex::new(()),
        }
    }

    /// Creates an index and hydrates it from `storage_file`.
    ///
    /// A missing file yields an empty index. A file that is not valid JSON
    /// is logged and ignored, the server starts with an empty table and the
    /// next successful mutation overwrites the unreadable file.
    pub fn open(storage_file: impl Into<PathBuf>) -> Self {
        let index = Self::empty(storage_file);
        match index.init_load() {
            Ok(count) => info!(
                path = %index.storage_file.display(),
                records = count,
                "Storage index loaded"
            ),
            Err(e) => warn!(
                path = %index.storage_file.display(),
                error = %e,
                "Storage index unreadable, starting empty"
            ),
        }
        index
    }

    pub fn path(&self) -> &Path {
        &self.storage_file
    }

    /// Merges the persistence file into the table and returns how many
    /// records were loaded.
    ///
    /// Array elements that fail to deserialize or lack a key/path are
    /// skipped one by one. Only an unreadable file or a document that is
    /// not JSON at all is reported as an error.
    pub fn init_load(&self) -> Result<usize> {
        if !self.storage_file.exists() {
            return Ok(0);
        }

        let body = fs::read(&self.storage_file)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(0);
        }

        let root: serde_json::Value = serde_json::from_slice(&body)?;
        let serde_json::Value::Array(items) = root else {
            warn!(path = %self.storage_file.display(), "Storage index is not a JSON array, ignoring");
            return Ok(0);
        };

        let mut loaded = 0;
        let mut table = self.table.write();
        for (i, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<ObjectRecord>(item) {
                Ok(record) if record.is_valid() => {
                    table.insert(record.url.clone(), record);
                    loaded += 1;
                }
                Ok(_) => debug!(element = i, "Skipping index entry without url or path"),
                Err(e) => debug!(element = i, error = %e, "Skipping malformed index entry"),
            }
        }

        Ok(loaded)
    }

    /// Adds or replaces the record for `record.url` and flushes the table.
    ///
    /// If the flush fails the in-memory change is undone (unless another
    /// writer has already replaced the entry) and the error is returned.
    pub fn insert(&self, record: ObjectRecord) -> Result<()> {
        if !record.is_valid() {
            return Err(Error::InvalidRecord(format!("{:?}", record)));
        }

        let key = record.url.clone();
        let previous = self.table.write().insert(key.clone(), record.clone());

        if let Err(e) = self.flush() {
            let mut table = self.table.write();
            if table.get(&key) == Some(&record) {
                match previous {
                    Some(prev) => table.insert(key, prev),
                    None => table.remove(&key),
                };
            }
            return Err(e);
        }

        Ok(())
    }

    /// Same upsert semantics as [`StorageIndex::insert`]; kept as a separate
    /// entry point for callers refreshing the attributes of a known object.
    pub fn update(&self, record: ObjectRecord) -> Result<()> {
        self.insert(record)
    }

    /// Drops the record for `url` and flushes. Returns the removed record.
    pub fn remove(&self, url: &str) -> Result<Option<ObjectRecord>> {
        let removed = self.table.write().remove(url);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    pub fn get_by_url(&self, url: &str) -> Option<ObjectRecord> {
        self.table.read().get(url).cloned()
    }

    /// Linear scan for the record stored at `storage_path`.
    pub fn get_by_path(&self, storage_path: &str) -> Option<ObjectRecord> {
        self.table
            .read()
            .values()
            .find(|r| r.storage_path == storage_path)
            .cloned()
    }

    pub fn get_all(&self) -> Vec<ObjectRecord> {
        self.table.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrites the persistence file from a snapshot of the table.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock();

        let mut snapshot: Vec<ObjectRecord> = self.table.read().values().cloned().collect();
        snapshot.sort_by(|a, b| a.url.cmp(&b.url));

        let body = serde_json::to_vec_pretty(&snapshot)?;
        self.write_atomically(&body)
            .map_err(|source| Error::PersistFailed {
                path: self.storage_file.clone(),
                source,
            })?;

        debug!(path = %self.storage_file.display(), records = snapshot.len(), "Storage index flushed");
        Ok(())
    }

    fn write_atomically(&self, body: &[u8]) -> std::io::Result<()> {
        let mut tmp_name = self.storage_file.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.storage_file)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}
