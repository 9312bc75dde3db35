//! Chorus Storage Library
//!
//! Object-storage abstraction for the media pipeline: the [`MediaStore`]
//! trait, S3 and local-filesystem backends, and the shared key generator.
//!
//! # Storage key format
//!
//! `media/{user_id}/{kind}/{timestamp_ms}-{suffix}.{ext}`; see the `keys`
//! module. Keys must not contain `..` or a leading `/`. All backends use the
//! same layout so artifacts stay addressable regardless of backend.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use chorus_core::StorageBackend;
pub use factory::create_store;
pub use keys::generate_media_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3Store;
pub use traits::{MediaStore, StorageError, StorageResult};
