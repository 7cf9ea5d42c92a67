mod image;

pub use image::{ImageRef, ImageUpload, ListingImages};
