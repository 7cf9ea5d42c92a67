//! Listing image reconciliation
//!
//! Computes a listing's next image list from its current keys, the keys the
//! client asked to retain, and the keys of freshly stored uploads. The
//! computation is pure: it either yields the complete plan or an error, and
//! never touches storage or the listing itself.

use panda_core::ImageRef;
use panda_storage::{StorageError, StorageResult};
use std::collections::HashSet;

/// Outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// The listing's next images, in display order
    pub images: Vec<ImageRef>,
    /// Keys that are no longer referenced and must be deleted from storage
    pub removed: Vec<String>,
}

impl ReconcilePlan {
    /// Ordered keys of the next image list.
    pub fn keys(&self) -> Vec<String> {
        self.images.iter().map(|image| image.key.clone()).collect()
    }
}

/// Reconcile `current` against the client's `retain` list.
///
/// * `retain == None`: nothing is removed or reordered; `appended` goes last.
/// * `retain == Some(keys)`: every key must already belong to the listing.
///   Images not retained are removed, retained ones take the order of
///   `keys` (first occurrence wins), and `appended` follows them.
///
/// `Some(&[])` therefore removes every existing image, unlike `None`.
pub fn reconcile(
    current: &[String],
    retain: Option<&[String]>,
    appended: &[String],
) -> StorageResult<ReconcilePlan> {
    // TODO: confirm with product whether an absent retain list should keep meaning "leave images alone".
    let Some(retain) = retain else {
        return Ok(ReconcilePlan {
            images: ImageRef::sequence(current.iter().chain(appended).cloned()),
            removed: Vec::new(),
        });
    };

    let present: HashSet<&str> = current.iter().map(String::as_str).collect();
    if let Some(unknown) = retain.iter().find(|key| !present.contains(key.as_str())) {
        return Err(StorageError::UnknownImageReference(format!(
            "Unknown retained image path included: {}",
            unknown
        )));
    }

    let mut kept_set = HashSet::new();
    let kept: Vec<&String> = retain
        .iter()
        .filter(|key| kept_set.insert(key.as_str()))
        .collect();

    let mut removed_set = HashSet::new();
    let removed: Vec<String> = current
        .iter()
        .filter(|key| !kept_set.contains(key.as_str()) && removed_set.insert(key.as_str()))
        .cloned()
        .collect();

    Ok(ReconcilePlan {
        images: ImageRef::sequence(kept.into_iter().chain(appended).cloned()),
        removed,
    })
}
