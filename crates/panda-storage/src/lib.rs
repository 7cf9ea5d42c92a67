//! Panda Storage Library
//!
//! This crate stores listing images. It provides the `Storage` trait, the
//! local filesystem and object storage implementations, and the key codec
//! that turns client-supplied identifiers into canonical storage keys.
//!
//! # Storage key format
//!
//! - **Object storage**: `{prefix}/{uuid}{ext}`, where `prefix` is the
//!   configured namespace (`listings` by default).
//! - **Local filesystem**: `{uuid}{ext}`, relative to the base directory.
//!
//! Clients may also refer to an image by its public API path
//! (`/api/images/{key}`) or, for object storage, by its bare file name. All
//! of these collapse to one canonical key through [`KeyCodec::normalize`].

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-object")]
pub mod object;
#[cfg(feature = "storage-object")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{KeyCodec, IMAGE_API_PREFIX};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-object")]
pub use object::{ObjectClient, ObjectStorage};
pub use panda_core::StorageBackend;
#[cfg(feature = "storage-object")]
pub use s3::S3Client;
pub use traits::{ByteStream, IssuedUrl, Storage, StorageError, StorageResult};
