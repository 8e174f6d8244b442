use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::storage::fs::{self, FileStat};

/// Index entry mapping a public object key to its on-disk location.
///
/// Field names on disk keep the historical `*_` suffix so existing
/// `storage.data` files load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Public key, `download_prefix + filename`. Unique within the index.
    #[serde(rename = "url_", default)]
    pub url: String,
    #[serde(rename = "storage_path_", default)]
    pub storage_path: String,
    #[serde(rename = "fsize_", default)]
    pub size: u64,
    #[serde(rename = "mtime_", default)]
    pub mtime: i64,
    #[serde(rename = "atime_", default)]
    pub atime: i64,
}

impl ObjectRecord {
    /// Builds a record for `storage_path` from attributes read elsewhere,
    /// such as a staged copy that has not been moved into place yet.
    pub fn from_stat(storage_path: &Path, st: FileStat, download_prefix: &str) -> Self {
        Self {
            url: format!("{}{}", download_prefix, fs::file_name(storage_path)),
            storage_path: storage_path.to_string_lossy().into_owned(),
            size: st.size,
            mtime: st.mtime,
            atime: st.atime,
        }
    }

    /// A record can only be persisted when both key and path are set.
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty() && !self.storage_path.is_empty()
    }

    /// Stored file name (last component of the storage path).
    pub fn file_name(&self) -> String {
        fs::file_name(Path::new(&self.storage_path))
    }

    /// `filename-size-mtime`
    pub fn etag(&self) -> String {
        format!("{}-{}-{}", self.file_name(), self.size, self.mtime)
    }
}
