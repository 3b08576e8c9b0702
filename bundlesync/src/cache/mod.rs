//! Local content cache: folder lookup, payload checksums and housekeeping.
//!
//! Nothing in this module talks to the catalog service. It only reads and
//! deletes what previous downloads left on disk.

mod catalog_files;
mod checksum;
mod file_id;
mod inspector;

pub use catalog_files::CatalogFiles;
pub use checksum::{checksum_bytes, checksum_of};
pub use file_id::{
    derive_file_id, derive_file_ids, BundleShape, BUILTIN_SHADERS_MARKER, MONO_SCRIPTS_MARKER,
};
pub use inspector::{CacheFolder, LocalCacheInspector, PurgeResult};
