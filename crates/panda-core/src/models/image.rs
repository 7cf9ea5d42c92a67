use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A listing image as seen by the listing aggregate.
///
/// `key` is the canonical storage key. `ordinal` is the zero-based position
/// in the listing's image list and is always derived from that position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub key: String,
    pub ordinal: usize,
}

impl ImageRef {
    /// Number an ordered key list.
    pub fn sequence<I, S>(keys: I) -> Vec<ImageRef>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keys.into_iter()
            .enumerate()
            .map(|(ordinal, key)| ImageRef {
                key: key.into(),
                ordinal,
            })
            .collect()
    }
}

/// One uploaded file handed over by the multipart layer.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Bytes,
    pub original_filename: Option<String>,
    pub content_type: String,
}

impl ImageUpload {
    pub fn new(
        data: impl Into<Bytes>,
        original_filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            original_filename: Some(original_filename.into()),
            content_type: content_type.into(),
        }
    }

    /// Empty parts carry no image and are skipped at store time.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Image side of the listing aggregate.
///
/// The listing entity and its repository live outside this workspace; the
/// image coordinator only needs to read the current ordered keys and replace
/// them wholesale once a reconciliation has been applied.
pub trait ListingImages {
    /// Canonical keys of the listing's images, in display order.
    fn current_image_keys(&self) -> Vec<String>;

    /// Replace the listing's images with `keys`, in order.
    fn replace_images(&mut self, keys: Vec<String>);
}
