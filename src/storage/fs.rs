//! Filesystem helpers shared by the index and the tier store.

use std::fs;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

use crate::error::Result;

/// File attributes recorded in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub mtime: i64,
    pub atime: i64,
}

pub fn stat(path: &Path) -> Result<FileStat> {
    let meta = fs::metadata(path)?;
    Ok(FileStat {
        size: meta.len(),
        mtime: meta.mtime(),
        atime: meta.atime(),
    })
}

/// Last path component, or the whole string when there is none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Creates `dir` and its parents; succeeds if it already exists.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content)?;
    Ok(())
}

/// Creates `path` exclusively and writes `content` through to disk.
pub fn write_new_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content)?;
    file.sync_all()?;
    Ok(())
}

pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Regular files directly inside `dir`, directories skipped.
pub fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}

/// True when `child` sits below `dir` after normalising `./` prefixes.
pub fn is_under(child: &Path, dir: &Path) -> bool {
    fn normalise(p: &Path) -> PathBuf {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
    normalise(child).starts_with(normalise(dir))
}
