//! Listing image coordination
//!
//! Sequences storage writes, reconciliation and storage deletes around a
//! listing aggregate so the aggregate only ever references stored objects:
//!
//! 1. validate the retain list (no I/O yet),
//! 2. store new uploads,
//! 3. reconcile (may reject; nothing has been deleted),
//! 4. delete removed objects,
//! 5. hand the final ordered key list to the aggregate.
//!
//! Uploads stored in step 2 are removed again when a later step fails, since
//! nothing references them.

use crate::reconcile::{reconcile, ReconcilePlan};
use panda_core::{ImageUpload, ListingImages};
use panda_storage::{IssuedUrl, Storage, StorageResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Orchestrates image changes for one listing at a time.
///
/// Holds no locks: concurrent updates of the same listing must be serialized
/// by the caller's transaction.
#[derive(Clone)]
pub struct ListingImageCoordinator {
    storage: Arc<dyn Storage>,
}

impl ListingImageCoordinator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Store uploads for a new listing and append them to its images.
    #[tracing::instrument(skip_all, fields(uploads = uploads.len()))]
    pub async fn attach_new<L>(
        &self,
        listing: &mut L,
        uploads: &[ImageUpload],
    ) -> StorageResult<Vec<String>>
    where
        L: ListingImages + ?Sized,
    {
        let stored = self.store_all(uploads).await?;

        let mut keys = listing.current_image_keys();
        keys.extend(stored.iter().cloned());
        listing.replace_images(keys);

        Ok(stored)
    }

    /// Apply a listing update's image changes.
    ///
    /// `retain` holds client identifiers (API paths, bare names or keys) of
    /// the existing images to keep, in the order they should appear. `None`
    /// leaves existing images untouched; an empty list removes them all.
    #[tracing::instrument(skip_all, fields(uploads = uploads.len(), retain = retain.map(|r| r.len())))]
    pub async fn update<L>(
        &self,
        listing: &mut L,
        retain: Option<&[String]>,
        uploads: &[ImageUpload],
    ) -> StorageResult<ReconcilePlan>
    where
        L: ListingImages + ?Sized,
    {
        let retain = retain
            .map(|identifiers| self.normalize_retain_list(identifiers))
            .transpose()?;

        let stored = self.store_all(uploads).await?;
        let current = listing.current_image_keys();

        let plan = match reconcile(&current, retain.as_deref(), &stored) {
            Ok(plan) => plan,
            Err(e) => {
                self.discard_stored(&stored).await;
                return Err(e);
            }
        };

        if !plan.removed.is_empty() {
            if let Err(e) = self.storage.delete(&plan.removed).await {
                tracing::error!(
                    error = %e,
                    removed = plan.removed.len(),
                    "Failed to delete removed listing images"
                );
                self.discard_stored(&stored).await;
                return Err(e);
            }
        }

        listing.replace_images(plan.keys());

        tracing::info!(
            images = plan.images.len(),
            removed = plan.removed.len(),
            added = stored.len(),
            "Listing images reconciled"
        );

        Ok(plan)
    }

    /// Delete every stored image of a listing that is being deleted.
    #[tracing::instrument(skip_all)]
    pub async fn discard_all<L>(&self, listing: &L) -> StorageResult<()>
    where
        L: ListingImages + ?Sized,
    {
        let keys = listing.current_image_keys();
        if keys.is_empty() {
            return Ok(());
        }
        self.storage.delete(&keys).await?;
        tracing::info!(removed = keys.len(), "Listing images deleted");
        Ok(())
    }

    /// Retrieval URLs for a listing's images, in display order.
    pub async fn image_urls<L>(&self, listing: &L) -> StorageResult<Vec<IssuedUrl>>
    where
        L: ListingImages + ?Sized,
    {
        let mut urls = Vec::new();
        for key in listing.current_image_keys() {
            urls.push(self.storage.issue_url(&key).await?);
        }
        Ok(urls)
    }

    /// Trim, drop blanks, normalize, and de-duplicate client identifiers.
    fn normalize_retain_list(&self, identifiers: &[String]) -> StorageResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let identifier = identifier.trim();
            if identifier.is_empty() {
                continue;
            }
            let key = self.storage.normalize(identifier)?;
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Store non-empty uploads in order. On failure, uploads stored so far
    /// are removed again before the error is returned.
    async fn store_all(&self, uploads: &[ImageUpload]) -> StorageResult<Vec<String>> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            if upload.is_empty() {
                tracing::debug!(
                    filename = ?upload.original_filename,
                    "Skipping empty image upload"
                );
                continue;
            }
            match self.storage.store(upload).await {
                Ok(key) => stored.push(key),
                Err(e) => {
                    self.discard_stored(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn discard_stored(&self, stored: &[String]) {
        if stored.is_empty() {
            return;
        }
        if let Err(e) = self.storage.delete(stored).await {
            tracing::warn!(
                error = %e,
                orphaned = stored.len(),
                "Failed to remove uploads of an aborted image update"
            );
        }
    }
}

#[cfg(all(test, feature = "storage-local", feature = "storage-object"))]
mod tests {
    use super::*;
    use panda_core::StorageBackend;
    use panda_storage::{LocalStorage, StorageError};
    use tempfile::{tempdir, TempDir};

    #[derive(Debug, Default)]
    struct Listing {
        images: Vec<String>,
        replaced: usize,
    }

    impl ListingImages for Listing {
        fn current_image_keys(&self) -> Vec<String> {
            self.images.clone()
        }

        fn replace_images(&mut self, keys: Vec<String>) {
            self.images = keys;
            self.replaced += 1;
        }
    }

    async fn local_coordinator() -> (TempDir, ListingImageCoordinator) {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        (dir, ListingImageCoordinator::new(Arc::new(storage)))
    }

    fn upload(name: &str, data: &[u8]) -> ImageUpload {
        ImageUpload::new(data.to_vec(), name, "image/jpeg")
    }

    fn file_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_attach_new_stores_and_skips_empty_uploads() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();

        let stored = coordinator
            .attach_new(
                &mut listing,
                &[upload("room.jpg", b"room"), upload("empty.jpg", b""), upload("bath.png", b"bath")],
            )
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(listing.images, stored);
        assert!(stored[0].ends_with(".jpg"));
        assert!(stored[1].ends_with(".png"));
        assert_eq!(file_count(&dir), 2);
    }

    #[tokio::test]
    async fn test_update_reorders_deletes_and_appends() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();
        let existing = coordinator
            .attach_new(
                &mut listing,
                &[upload("a.jpg", b"a"), upload("b.jpg", b"b"), upload("c.jpg", b"c")],
            )
            .await
            .unwrap();
        let (a, b, c) = (&existing[0], &existing[1], &existing[2]);

        // Clients may send API paths or keys.
        let retain = vec![format!("/api/images/{}", c), a.clone()];
        let plan = coordinator
            .update(&mut listing, Some(retain.as_slice()), &[upload("d.jpg", b"d")])
            .await
            .unwrap();

        assert_eq!(plan.removed, vec![b.clone()]);
        assert_eq!(listing.images.len(), 3);
        assert_eq!(&listing.images[0], c);
        assert_eq!(&listing.images[1], a);
        assert!(!existing.contains(&listing.images[2]));
        assert!(!dir.path().join(b).exists());
        assert!(dir.path().join(&listing.images[2]).exists());
        assert_eq!(file_count(&dir), 3);
    }

    #[tokio::test]
    async fn test_update_with_unknown_reference_changes_nothing() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();
        let existing = coordinator
            .attach_new(&mut listing, &[upload("a.jpg", b"a"), upload("b.jpg", b"b")])
            .await
            .unwrap();
        let replaced_before = listing.replaced;

        let retain = vec![existing[0].clone(), "someone-else.jpg".to_string()];
        let result = coordinator
            .update(&mut listing, Some(retain.as_slice()), &[upload("new.jpg", b"new")])
            .await;

        assert!(matches!(result, Err(StorageError::UnknownImageReference(_))));
        assert_eq!(listing.images, existing);
        assert_eq!(listing.replaced, replaced_before);
        // Existing files survive and the rejected upload was cleaned up.
        assert!(existing.iter().all(|key| dir.path().join(key).exists()));
        assert_eq!(file_count(&dir), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_update_accepts_absolute_path_of_own_image() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();
        let existing = coordinator
            .attach_new(&mut listing, &[upload("a.jpg", b"a"), upload("b.jpg", b"b")])
            .await
            .unwrap();

        let base = dir.path().canonicalize().unwrap();
        let retain = vec![base.join(&existing[1]).to_string_lossy().to_string()];

        let plan = coordinator
            .update(&mut listing, Some(retain.as_slice()), &[])
            .await
            .unwrap();

        assert_eq!(listing.images, vec![existing[1].clone()]);
        assert_eq!(plan.removed, vec![existing[0].clone()]);
    }

    #[tokio::test]
    async fn test_update_with_invalid_identifier_fails_before_storing() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();

        let retain = vec!["../escape.jpg".to_string()];
        let result = coordinator
            .update(&mut listing, Some(retain.as_slice()), &[upload("new.jpg", b"new")])
            .await;

        assert!(matches!(result, Err(StorageError::InvalidIdentifier(_))));
        assert_eq!(file_count(&dir), 0);
        assert_eq!(listing.replaced, 0);
    }

    #[tokio::test]
    async fn test_update_without_retain_list_only_appends() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();
        let existing = coordinator
            .attach_new(&mut listing, &[upload("a.jpg", b"a"), upload("b.jpg", b"b")])
            .await
            .unwrap();

        let plan = coordinator
            .update(&mut listing, None, &[upload("c.jpg", b"c")])
            .await
            .unwrap();

        assert!(plan.removed.is_empty());
        assert_eq!(listing.images.len(), 3);
        assert_eq!(&listing.images[..2], existing.as_slice());
        assert_eq!(file_count(&dir), 3);
    }

    #[tokio::test]
    async fn test_update_with_empty_retain_list_removes_all() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();
        coordinator
            .attach_new(&mut listing, &[upload("a.jpg", b"a"), upload("b.jpg", b"b")])
            .await
            .unwrap();

        let retain: Vec<String> = vec!["  ".to_string()];
        let plan = coordinator
            .update(&mut listing, Some(retain.as_slice()), &[])
            .await
            .unwrap();

        assert_eq!(plan.removed.len(), 2);
        assert!(listing.images.is_empty());
        assert_eq!(file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_discard_all_removes_files() {
        let (dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();
        coordinator
            .attach_new(&mut listing, &[upload("a.jpg", b"a"), upload("b.jpg", b"b")])
            .await
            .unwrap();

        coordinator.discard_all(&listing).await.unwrap();

        assert_eq!(file_count(&dir), 0);
    }

    #[tokio::test]
    async fn test_image_urls_follow_listing_order() {
        let (_dir, coordinator) = local_coordinator().await;
        let mut listing = Listing::default();
        let keys = coordinator
            .attach_new(&mut listing, &[upload("a.jpg", b"a"), upload("b.jpg", b"b")])
            .await
            .unwrap();

        let urls = coordinator.image_urls(&listing).await.unwrap();

        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].url, format!("/api/images/{}", keys[0]));
        assert_eq!(urls[1].url, format!("/api/images/{}", keys[1]));
        assert_eq!(coordinator.storage().backend_type(), StorageBackend::Local);
    }

    mod object_backend {
        use super::*;
        use async_trait::async_trait;
        use bytes::Bytes;
        use object_store::Result as ObjectResult;
        use panda_storage::{ObjectClient, ObjectStorage};
        use std::sync::Mutex;
        use std::time::Duration;

        /// In-memory client whose puts and deletes can be made to fail.
        #[derive(Default)]
        struct MemoryClient {
            objects: Mutex<Vec<String>>,
            put_calls: Mutex<usize>,
            delete_calls: Mutex<Vec<String>>,
            /// Puts after this many successful ones fail
            puts_allowed: Option<usize>,
            failing_deletes: Vec<String>,
        }

        fn throttled() -> object_store::Error {
            object_store::Error::Generic {
                store: "memory",
                source: "throttled".into(),
            }
        }

        #[async_trait]
        impl ObjectClient for MemoryClient {
            async fn put(&self, key: &str, _: Bytes, _: &str) -> ObjectResult<()> {
                let mut calls = self.put_calls.lock().unwrap();
                if self.puts_allowed.is_some_and(|allowed| *calls >= allowed) {
                    return Err(throttled());
                }
                *calls += 1;
                self.objects.lock().unwrap().push(key.to_string());
                Ok(())
            }

            async fn delete(&self, key: &str) -> ObjectResult<()> {
                self.delete_calls.lock().unwrap().push(key.to_string());
                if self.failing_deletes.iter().any(|k| k == key) {
                    return Err(throttled());
                }
                self.objects.lock().unwrap().retain(|k| k != key);
                Ok(())
            }

            async fn signed_get_url(&self, key: &str, _: Duration) -> ObjectResult<String> {
                Ok(format!("https://signed.example/{}", key))
            }
        }

        fn coordinator(client: Arc<MemoryClient>) -> ListingImageCoordinator {
            let storage = ObjectStorage::new(client, "panda-images", "listings", Duration::from_secs(900));
            ListingImageCoordinator::new(Arc::new(storage))
        }

        #[tokio::test]
        async fn test_unknown_reference_issues_no_delete_of_existing_images() {
            let client = Arc::new(MemoryClient::default());
            let coordinator = coordinator(client.clone());
            let mut listing = Listing {
                images: vec!["listings/a.png".to_string(), "listings/b.png".to_string()],
                replaced: 0,
            };

            let retain = vec!["listings/zzz.png".to_string()];
            let result = coordinator
                .update(&mut listing, Some(retain.as_slice()), &[upload("c.jpg", b"c")])
                .await;

            assert!(matches!(result, Err(StorageError::UnknownImageReference(_))));
            let deletes = client.delete_calls.lock().unwrap();
            assert!(!deletes.contains(&"listings/a.png".to_string()));
            assert!(!deletes.contains(&"listings/b.png".to_string()));
            // Only the rolled-back upload was deleted.
            assert_eq!(deletes.len(), 1);
            assert!(client.objects.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_bare_names_resolve_under_prefix() {
            let client = Arc::new(MemoryClient::default());
            let coordinator = coordinator(client.clone());
            let mut listing = Listing {
                images: vec!["listings/a.png".to_string(), "listings/b.png".to_string()],
                replaced: 0,
            };

            let retain = vec!["b.png".to_string()];
            coordinator
                .update(&mut listing, Some(retain.as_slice()), &[])
                .await
                .unwrap();

            assert_eq!(listing.images, vec!["listings/b.png".to_string()]);
            assert_eq!(
                *client.delete_calls.lock().unwrap(),
                vec!["listings/a.png".to_string()]
            );
        }

        #[tokio::test]
        async fn test_failed_delete_leaves_listing_untouched_and_removes_new_uploads() {
            let client = Arc::new(MemoryClient {
                failing_deletes: vec!["listings/a.png".to_string()],
                ..Default::default()
            });
            let coordinator = coordinator(client.clone());
            let mut listing = Listing {
                images: vec!["listings/a.png".to_string(), "listings/b.png".to_string()],
                replaced: 0,
            };

            let retain = vec!["listings/b.png".to_string()];
            let result = coordinator
                .update(&mut listing, Some(retain.as_slice()), &[upload("c.jpg", b"c")])
                .await;

            assert!(matches!(
                result,
                Err(StorageError::Unavailable { operation: "delete", .. })
            ));
            assert_eq!(listing.replaced, 0);
            assert_eq!(
                listing.images,
                vec!["listings/a.png".to_string(), "listings/b.png".to_string()]
            );
            // The upload stored before the failed delete was removed again.
            assert!(client.objects.lock().unwrap().is_empty());
            let deletes = client.delete_calls.lock().unwrap();
            assert_eq!(deletes.len(), 2);
            assert_eq!(deletes[0], "listings/a.png");
            assert!(deletes[1].starts_with("listings/") && deletes[1].ends_with(".jpg"));
        }

        #[tokio::test]
        async fn test_failed_upload_removes_earlier_uploads_of_the_batch() {
            let client = Arc::new(MemoryClient {
                puts_allowed: Some(2),
                ..Default::default()
            });
            let coordinator = coordinator(client.clone());
            let mut listing = Listing {
                images: vec!["listings/a.png".to_string()],
                replaced: 0,
            };

            let result = coordinator
                .attach_new(
                    &mut listing,
                    &[upload("b.jpg", b"b"), upload("c.jpg", b"c"), upload("d.jpg", b"d")],
                )
                .await;

            assert!(matches!(
                result,
                Err(StorageError::Unavailable { operation: "store", .. })
            ));
            assert_eq!(listing.replaced, 0);
            assert_eq!(listing.images, vec!["listings/a.png".to_string()]);
            assert!(client.objects.lock().unwrap().is_empty());
            let deletes = client.delete_calls.lock().unwrap();
            assert_eq!(deletes.len(), 2);
            assert!(!deletes.contains(&"listings/a.png".to_string()));
        }

        #[tokio::test]
        async fn test_image_urls_are_presigned() {
            let coordinator = coordinator(Arc::new(MemoryClient::default()));
            let listing = Listing {
                images: vec!["listings/a.png".to_string()],
                replaced: 0,
            };

            let urls = coordinator.image_urls(&listing).await.unwrap();

            assert_eq!(urls[0].url, "https://signed.example/listings/a.png");
            assert_eq!(urls[0].expires_in, Some(Duration::from_secs(900)));
        }
    }
}
