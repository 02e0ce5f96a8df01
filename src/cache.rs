use image::RgbaImage;
use std::collections::HashMap;

use crate::image_name::ImageName;

/// Cropped image buffers and the pixel each crop was centered on.
///
/// Entries are never evicted or replaced; the cache lives as long as the
/// manager that owns it.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<ImageName, RgbaImage>,
    // Original (x, y) pixel used to compute each crop window
    coords: HashMap<ImageName, (i64, i64)>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a crop. Returns `false` and keeps the existing buffer when the
    /// name is already cached.
    pub fn insert(&mut self, name: ImageName, image: RgbaImage) -> bool {
        if self.images.contains_key(&name) {
            return false;
        }
        self.coords.insert(name.clone(), (name.x, name.y));
        self.images.insert(name, image);
        true
    }

    pub fn get(&self, name: &ImageName) -> Option<&RgbaImage> {
        self.images.get(name)
    }

    pub fn coords(&self, name: &ImageName) -> Option<(i64, i64)> {
        self.coords.get(name).copied()
    }

    pub fn contains(&self, name: &ImageName) -> bool {
        self.images.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn offset_count(&self) -> usize {
        self.coords.len()
    }
}
