//! Two-tier object storage
//!
//! Objects live either in the plain tier (bytes stored as uploaded) or in
//! the archive tier (bytes packed by [`codec`]). The [`index::StorageIndex`]
//! maps each public object key to its on-disk record and persists the whole
//! table as a JSON array.
//!
//! ```text
//!   upload ──► TierStore::store ──► fs write (low) / pack + write (deep)
//!                                        │
//!                                        ▼
//!                               StorageIndex::insert ──► flush JSON
//!
//!   download ──► TierStore::open ──► StorageIndex::get_by_url
//!                                        │
//!                          deep? ──► unpack into <low>/.inflate/
//!                                        │
//!                                        ▼
//!                                   MappedFile
//! ```

pub mod codec;
pub mod fs;
pub mod index;
pub mod mapped;
pub mod record;
pub mod tiers;

pub use index::StorageIndex;
pub use mapped::MappedFile;
pub use record::ObjectRecord;
pub use tiers::{Tier, TierStore};
