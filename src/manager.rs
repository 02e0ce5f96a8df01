//! The manager the annotation GUI talks to.
//!
//! It owns the spatial index, the image cache and the candidates of the most
//! recent query. The GUI asks for candidates whenever the location of interest
//! changes, then requests cropped buffers by [`ImageName`] for rendering.

use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::ImageCache;
use crate::constants::{IMAGES_DIR, INDEX_BASENAME};
use crate::error::{ObliqueError, Result};
use crate::image_name::ImageName;
use crate::image_processing::{crop_origin, load_image};
use crate::index::{AerialIndex, ImageRef};
use crate::preload::{load_batch, split_results, LoadRequest, PreloadReport};
use crate::settings::Settings;
use crate::world_points::{GeoLocation, JsonWorldPoints, WorldPointSource};

pub struct ObliqueManager {
    path: PathBuf,
    index: AerialIndex,
    cache: ImageCache,
    candidates: Vec<ImageRef>,
    settings: Settings,
}

impl ObliqueManager {
    /// Opens the dataset at `path`, building the spatial index from
    /// `world_points.json` if none is persisted yet. Settings come from the
    /// dataset's settings file, with `preload_images` taking precedence.
    pub fn new<P: AsRef<Path>>(path: P, preload_images: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = Settings::load(path)?;
        settings.preload_images = preload_images;
        Self::with_source(path, settings, &JsonWorldPoints)
    }

    /// Opens the dataset with explicit settings and world point source.
    pub fn with_source<P: AsRef<Path>>(
        path: P,
        settings: Settings,
        source: &dyn WorldPointSource,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index = AerialIndex::open_or_build(&path.join(INDEX_BASENAME), &path, source)?;

        Ok(ObliqueManager {
            path,
            index,
            cache: ImageCache::new(),
            candidates: Vec::new(),
            settings,
        })
    }

    pub fn image_path(&self, image_id: &str) -> PathBuf {
        self.path.join(IMAGES_DIR).join(image_id)
    }

    /// Cropped buffer for `name`, decoding it on first use.
    pub fn get_image(&mut self, name: &ImageName) -> Result<&RgbaImage> {
        if !self.cache.contains(name) {
            let path = self.image_path(&name.image_id);
            let image = load_image(&path, name.x, name.y, self.settings.crop_half_width)?;
            self.cache.insert(name.clone(), image);
        }
        self.cache
            .get(name)
            .ok_or_else(|| ObliqueError::NotCached(name.clone()))
    }

    /// Oblique images have no single canonical location, so there is nothing
    /// to report here.
    pub fn load_latlons(&self) -> HashMap<String, GeoLocation> {
        HashMap::new()
    }

    /// Images that likely show `(lat, lon)`: the bundle of the nearest indexed
    /// world point.
    ///
    /// Returns an empty list when either coordinate is missing. Preloads the
    /// candidates unless preloading was disabled.
    pub fn get_candidates(&mut self, lat: Option<f64>, lon: Option<f64>) -> Result<Vec<ImageName>> {
        let (lat, lon) = match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => (lat, lon),
            _ => return Ok(Vec::new()),
        };

        let record = self
            .index
            .nearest(lon, lat)
            .ok_or(ObliqueError::NoCandidates { lat, lon })?;
        self.candidates = record.images.clone();
        let names = record.image_names();
        info!("Found {} aerial images near point {}", names.len(), record.key);

        if self.settings.preload_images {
            let report = self.preload_images()?;
            if !report.is_complete() {
                warn!("{} of {} candidates failed to preload", report.failed.len(), names.len());
            }
        }

        Ok(names)
    }

    /// Loads every candidate of the latest query into the cache on the worker
    /// pool. Already cached images are skipped.
    pub fn preload_images(&mut self) -> Result<PreloadReport> {
        let requests: Vec<LoadRequest> = self
            .candidates
            .iter()
            .map(ImageRef::name)
            .filter(|name| !self.cache.contains(name))
            .map(|name| LoadRequest {
                path: self.image_path(&name.image_id),
                name,
            })
            .collect();

        let mut report = PreloadReport::default();
        if requests.is_empty() {
            report.skipped = self.candidates.len();
            return Ok(report);
        }

        let results = load_batch(&requests, self.settings.crop_half_width, self.settings.workers())?;
        let (loaded, failed) = split_results(results);
        for (name, image) in loaded {
            self.cache.insert(name.clone(), image);
            report.loaded.push(name);
        }
        report.failed = failed;
        report.skipped = self.candidates.len() - report.loaded.len() - report.failed.len();
        Ok(report)
    }

    /// `(height, width)` of the cropped buffer.
    pub fn get_image_size(&mut self, name: &ImageName) -> Result<(u32, u32)> {
        let image = self.get_image(name)?;
        Ok((image.height(), image.width()))
    }

    /// Top-left corner of the crop window of a cached image, in full-image
    /// pixels.
    pub fn get_offsets(&self, name: &ImageName) -> Result<(u32, u32)> {
        let (px, py) = self
            .cache
            .coords(name)
            .ok_or_else(|| ObliqueError::NotCached(name.clone()))?;
        let image = self
            .cache
            .get(name)
            .ok_or_else(|| ObliqueError::NotCached(name.clone()))?;

        let win = self.settings.crop_half_width;
        let (x1, y1) = crop_origin(px, py, win);
        debug_assert!(i64::from(x1) + i64::from(image.width()) <= px.saturating_add(i64::from(win)));
        debug_assert!(i64::from(y1) + i64::from(image.height()) <= py.saturating_add(i64::from(win)));
        Ok((x1, y1))
    }

    /// Maps a position in the displayed crop back to full-image pixels.
    pub fn to_full_image_coords(&self, name: &ImageName, x: f64, y: f64) -> Result<(f64, f64)> {
        let (x1, y1) = self.get_offsets(name)?;
        Ok((f64::from(x1) + x, f64::from(y1) + y))
    }

    /// Where the point of interest lies inside the crop of a cached image.
    pub fn feature_position(&self, name: &ImageName) -> Result<(i64, i64)> {
        let (x1, y1) = self.get_offsets(name)?;
        Ok((name.x - i64::from(x1), name.y - i64::from(y1)))
    }

    /// Snapping clicks to reconstructed features is not available for oblique
    /// images.
    pub fn get_nearest_feature(&self, _name: &ImageName, _x: f64, _y: f64) -> Option<(f64, f64)> {
        None
    }

    pub fn candidates(&self) -> &[ImageRef] {
        &self.candidates
    }

    pub fn is_cached(&self, name: &ImageName) -> bool {
        self.cache.contains(name)
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn index(&self) -> &AerialIndex {
        &self.index
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dataset_path(&self) -> &Path {
        &self.path
    }
}
