use std::sync::Arc;

use tierserve::config::StorageConfig;
use tierserve::error::Error;
use tierserve::storage::codec::{self, Format};
use tierserve::storage::fs;
use tierserve::storage::index::StorageIndex;
use tierserve::storage::tiers::{INFLATE_DIR, Tier, TierStore};

fn config(root: &std::path::Path, format: Format) -> StorageConfig {
    StorageConfig {
        download_prefix: "/download/".to_string(),
        low_storage_dir: root.join("low"),
        deep_storage_dir: root.join("deep"),
        storage_info: root.join("storage.data"),
        bundle_format: format,
    }
}

fn store_at(cfg: &StorageConfig) -> TierStore {
    TierStore::new(Arc::new(StorageIndex::open(&cfg.storage_info)), cfg)
}

#[test]
fn test_deep_round_trip_for_every_format() {
    let payload: Vec<u8> = b"tierserve ".iter().cycle().take(50_000).copied().collect();

    for format in [Format::Stored, Format::Lz4, Format::Lz4hc] {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), format);
        let store = store_at(&cfg);

        let record = store.store("big.txt", Tier::Deep, &payload).unwrap();
        assert_eq!(record.url, "/download/big.txt");
        assert!(store.is_archived(&record));

        let packed = std::fs::read(&record.storage_path).unwrap();
        assert_eq!(packed[0], format.code());
        assert_eq!(record.size, packed.len() as u64);

        let download = store.open("/download/big.txt").unwrap();
        assert!(download.file.is_temporary());
        assert_eq!(download.file.as_bytes(), payload.as_slice());
    }
}

#[test]
fn test_low_tier_stores_bytes_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4);
    let store = store_at(&cfg);

    let record = store.store("plain.txt", Tier::Low, b"as is").unwrap();
    assert!(!store.is_archived(&record));
    assert_eq!(std::fs::read(cfg.low_storage_dir.join("plain.txt")).unwrap(), b"as is");

    let download = store.open("/download/plain.txt").unwrap();
    assert!(!download.file.is_temporary());
    assert_eq!(download.file.as_bytes(), b"as is");
    assert_eq!(download.record.etag(), format!("plain.txt-5-{}", record.mtime));
}

#[test]
fn test_inflated_copies_are_private_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4);
    let store = store_at(&cfg);
    store.store("same.bin", Tier::Deep, &[1u8; 1000]).unwrap();

    let first = store.open("/download/same.bin").unwrap();
    let second = store.open("/download/same.bin").unwrap();
    assert_ne!(first.file.path(), second.file.path());

    let scratch = cfg.low_storage_dir.join(INFLATE_DIR);
    assert_eq!(fs::scan_dir(&scratch).unwrap().len(), 2);

    drop(first);
    drop(second);
    assert!(fs::scan_dir(&scratch).unwrap().is_empty());
}

#[test]
fn test_failed_index_flush_removes_written_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), Format::Lz4);
    cfg.storage_info = dir.path().join("no-such-dir").join("storage.data");
    let store = store_at(&cfg);

    let err = store.store("orphan.txt", Tier::Low, b"data").unwrap_err();
    assert!(matches!(err, Error::PersistFailed { .. }));
    assert!(!cfg.low_storage_dir.join("orphan.txt").exists());
    assert!(store.index().get_by_url("/download/orphan.txt").is_none());

    let err = store.store("orphan.bin", Tier::Deep, b"data").unwrap_err();
    assert!(matches!(err, Error::PersistFailed { .. }));
    assert!(!cfg.deep_storage_dir.join("orphan.bin").exists());

    assert!(fs::scan_dir(&cfg.low_storage_dir).unwrap().is_empty());
    assert!(fs::scan_dir(&cfg.deep_storage_dir).unwrap().is_empty());
}

#[test]
fn test_reupload_leaves_open_download_intact() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4);
    let store = store_at(&cfg);

    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    store.store("big.bin", Tier::Low, &payload).unwrap();
    let old = store.open("/download/big.bin").unwrap();

    let record = store.store("big.bin", Tier::Low, b"small").unwrap();
    assert_eq!(record.size, 5);

    assert_eq!(old.file.len(), payload.len());
    assert_eq!(old.file.as_bytes()[40_000], payload[40_000]);
    assert_eq!(old.file.as_bytes(), payload.as_slice());

    let new = store.open("/download/big.bin").unwrap();
    assert_eq!(new.file.as_bytes(), b"small");
    assert_eq!(fs::scan_dir(&cfg.low_storage_dir).unwrap().len(), 1);
}

#[test]
fn test_failed_reupload_keeps_previous_object() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4);
    let store = store_at(&cfg);
    store.store("a.txt", Tier::Low, b"version one").unwrap();

    // The index writes through `<storage_info>.tmp`; a directory there
    // makes every flush fail.
    let blocker = dir.path().join("storage.data.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let err = store.store("a.txt", Tier::Low, b"version two").unwrap_err();
    assert!(matches!(err, Error::PersistFailed { .. }));

    let record = store.index().get_by_url("/download/a.txt").unwrap();
    assert_eq!(record.size, 11);
    let download = store.open("/download/a.txt").unwrap();
    assert_eq!(download.file.as_bytes(), b"version one");
    assert_eq!(fs::scan_dir(&cfg.low_storage_dir).unwrap().len(), 1);

    std::fs::remove_dir(&blocker).unwrap();
    store.store("a.txt", Tier::Low, b"version two").unwrap();
    let download = store.open("/download/a.txt").unwrap();
    assert_eq!(download.file.as_bytes(), b"version two");
}

#[test]
fn test_hidden_names_cannot_shadow_inflate_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4);
    let store = store_at(&cfg);
    store.store("cold.bin", Tier::Deep, b"archived bytes").unwrap();

    assert!(matches!(
        store.store(INFLATE_DIR, Tier::Low, b"x"),
        Err(Error::InvalidUpload(_))
    ));
    assert!(matches!(
        store.store(".profile", Tier::Deep, b"x"),
        Err(Error::InvalidUpload(_))
    ));

    let download = store.open("/download/cold.bin").unwrap();
    assert_eq!(download.file.as_bytes(), b"archived bytes");
}

#[test]
fn test_store_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(&config(dir.path(), Format::Lz4));

    assert!(matches!(
        store.store("../escape", Tier::Low, b"x"),
        Err(Error::InvalidUpload(_))
    ));
    assert!(matches!(store.store("empty", Tier::Low, b""), Err(Error::InvalidUpload(_))));
    assert!(store.index().is_empty());
}

#[test]
fn test_open_missing_object_or_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4);
    let store = store_at(&cfg);

    assert!(matches!(store.open("/download/none"), Err(Error::NotFound(_))));

    store.store("gone.txt", Tier::Low, b"x").unwrap();
    std::fs::remove_file(cfg.low_storage_dir.join("gone.txt")).unwrap();
    assert!(matches!(store.open("/download/gone.txt"), Err(Error::NotFound(_))));
}

#[test]
fn test_index_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4hc);
    store_at(&cfg).store("kept.bin", Tier::Deep, b"kept across restarts").unwrap();

    let restarted = store_at(&cfg);
    let download = restarted.open("/download/kept.bin").unwrap();
    assert_eq!(download.file.as_bytes(), b"kept across restarts");
}

#[test]
fn test_corrupt_archive_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Format::Lz4);
    let store = store_at(&cfg);
    let record = store.store("c.bin", Tier::Deep, b"payload").unwrap();

    std::fs::write(&record.storage_path, [codec::Format::Lz4.code(), 0xff, 0xff]).unwrap();
    let err = store.open("/download/c.bin").unwrap_err();
    assert!(!err.is_client_error());
}
