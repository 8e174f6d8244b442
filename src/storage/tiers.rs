use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::storage::codec::{self, Format};
use crate::storage::fs;
use crate::storage::index::StorageIndex;
use crate::storage::mapped::MappedFile;
use crate::storage::record::ObjectRecord;

/// Scratch directory (under the plain tier) for inflated archive copies.
pub const INFLATE_DIR: &str = ".inflate";
/// Prefix of upload payloads staged inside a tier directory.
const STAGING_PREFIX: &str = ".upload";

/// Storage tier named by the upload's `StorageType` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Plain tier, bytes stored as uploaded.
    Low,
    /// Archive tier, bytes packed with the configured codec.
    Deep,
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "low" => Ok(Tier::Low),
            "deep" => Ok(Tier::Deep),
            other => Err(Error::InvalidUpload(format!("unknown storage type {:?}", other))),
        }
    }
}

/// An object resolved for download.
#[derive(Debug)]
pub struct Download {
    pub record: ObjectRecord,
    /// Plain bytes; a temporary inflated copy for archived objects.
    pub file: MappedFile,
}

/// Glue between the HTTP layer, the two tier directories and the index.
pub struct TierStore {
    index: Arc<StorageIndex>,
    low_dir: PathBuf,
    deep_dir: PathBuf,
    download_prefix: String,
    format: Format,
    scratch_seq: AtomicU64,
}

impl TierStore {
    pub fn new(index: Arc<StorageIndex>, cfg: &StorageConfig) -> Self {
        Self {
            index,
            low_dir: cfg.low_storage_dir.clone(),
            deep_dir: cfg.deep_storage_dir.clone(),
            download_prefix: cfg.download_prefix.clone(),
            format: cfg.bundle_format,
            scratch_seq: AtomicU64::new(0),
        }
    }

    pub fn index(&self) -> &Arc<StorageIndex> {
        &self.index
    }

    pub fn download_prefix(&self) -> &str {
        &self.download_prefix
    }

    pub fn tier_dir(&self, tier: Tier) -> &Path {
        match tier {
            Tier::Low => &self.low_dir,
            Tier::Deep => &self.deep_dir,
        }
    }

    /// True when the record's bytes live in the archive tier.
    pub fn is_archived(&self, record: &ObjectRecord) -> bool {
        fs::is_under(Path::new(&record.storage_path), &self.deep_dir)
    }

    /// Writes `body` into `tier` as `filename` and indexes it.
    ///
    /// The payload is staged under a hidden name, indexed, then renamed over
    /// the target. A failure at any step leaves the previous object (if any)
    /// indexed and readable, and views already open on it keep their bytes.
    pub fn store(&self, filename: &str, tier: Tier, body: &[u8]) -> Result<ObjectRecord> {
        validate_filename(filename)?;
        if body.is_empty() {
            return Err(Error::InvalidUpload("empty body".into()));
        }

        let dir = self.tier_dir(tier);
        fs::ensure_dir(dir)?;
        let path = dir.join(filename);
        let staged = dir.join(format!("{}-{}", STAGING_PREFIX, self.scratch_name(filename)));

        let record = match self.stage(&staged, &path, tier, body) {
            Ok(record) => record,
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        };

        let previous = self.index.get_by_url(&record.url);
        if let Err(e) = self.index.insert(record.clone()) {
            discard(&staged);
            return Err(e);
        }

        if let Err(e) = std::fs::rename(&staged, &path) {
            discard(&staged);
            self.restore(&record.url, previous);
            return Err(e.into());
        }

        info!(
            url = %record.url,
            tier = ?tier,
            size = body.len(),
            stored = record.size,
            "Object stored"
        );
        Ok(record)
    }

    /// Writes the tier's encoding of `body` to `staged` and describes it as
    /// if it already lived at `path`.
    fn stage(&self, staged: &Path, path: &Path, tier: Tier, body: &[u8]) -> Result<ObjectRecord> {
        match tier {
            Tier::Low => fs::write_new_synced(staged, body)?,
            Tier::Deep => fs::write_new_synced(staged, &codec::pack(self.format, body)?)?,
        }
        let st = fs::stat(staged)?;
        Ok(ObjectRecord::from_stat(path, st, &self.download_prefix))
    }

    /// Puts the index entry for `url` back to what it was before a failed
    /// upload.
    fn restore(&self, url: &str, previous: Option<ObjectRecord>) {
        let restored = match previous {
            Some(prev) => self.index.insert(prev),
            None => self.index.remove(url).map(|_| ()),
        };
        if let Err(e) = restored {
            warn!(url = %url, error = %e, "Failed to roll back index entry");
        }
    }

    /// `<pid>-<seq>-<name>`, unique within this process.
    fn scratch_name(&self, name: &str) -> String {
        let seq = self.scratch_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", std::process::id(), seq, name)
    }

    /// Resolves an object key to a readable view of its plain bytes.
    pub fn open(&self, key: &str) -> Result<Download> {
        let record = self
            .index
            .get_by_url(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        let stored = Path::new(&record.storage_path);
        if !stored.exists() {
            return Err(Error::NotFound(record.storage_path.clone()));
        }

        let file = if self.is_archived(&record) {
            self.inflate(stored, &record)?
        } else {
            MappedFile::open(stored)?
        };

        Ok(Download { record, file })
    }

    fn inflate(&self, archived: &Path, record: &ObjectRecord) -> Result<MappedFile> {
        let scratch = self.low_dir.join(INFLATE_DIR);
        fs::ensure_dir(&scratch)?;

        let target = scratch.join(self.scratch_name(&record.file_name()));

        let plain = codec::unpack(&fs::read_file(archived)?)?;
        if let Err(e) = fs::write_file(&target, &plain) {
            discard(&target);
            return Err(e);
        }

        MappedFile::open_temporary(&target)
    }
}

/// Removes a scratch file, ignoring one that was never created.
fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
        }
    }
}

/// Upload names become a single visible path component inside a tier
/// directory. Hidden names are reserved for staging and inflate scratch.
fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(Error::InvalidUpload(format!("bad file name {:?}", name)));
    }
    Ok(())
}
