//! Panda Services Layer
//!
//! This crate hosts listing image orchestration: reconciling a listing's
//! image list against what the client asked to keep, and sequencing the
//! storage calls around it. It re-exports the storage API so the HTTP crate
//! depends on a single service facade.

pub mod coordinator;
pub mod reconcile;

pub use coordinator::ListingImageCoordinator;
pub use reconcile::{reconcile, ReconcilePlan};

#[cfg(feature = "storage-local")]
pub use panda_storage::LocalStorage;
#[cfg(feature = "storage-object")]
pub use panda_storage::{ObjectClient, ObjectStorage, S3Client};
pub use panda_storage::{
    create_storage, IssuedUrl, Storage, StorageBackend, StorageError, StorageResult,
};
