use image::RgbaImage;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{ObliqueError, Result};
use crate::image_name::ImageName;
use crate::image_processing::load_image;

/// One crop to load: which file and which pixel to center on.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub name: ImageName,
    pub path: PathBuf,
}

/// An image that failed to load during preloading.
#[derive(Debug)]
pub struct PreloadFailure {
    pub name: ImageName,
    pub error: ObliqueError,
}

/// Outcome of a preload batch.
#[derive(Debug, Default)]
pub struct PreloadReport {
    pub loaded: Vec<ImageName>,
    pub skipped: usize,
    pub failed: Vec<PreloadFailure>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads every request on a pool of `workers` threads.
///
/// Each request yields its own result; one bad image does not stop the
/// others. Results come back in request order. Duplicate names are loaded once.
pub fn load_batch(
    requests: &[LoadRequest],
    half_width: u32,
    workers: usize,
) -> Result<Vec<(ImageName, Result<RgbaImage>)>> {
    let mut seen = HashSet::new();
    let unique: Vec<&LoadRequest> = requests
        .iter()
        .filter(|r| seen.insert(r.name.clone()))
        .collect();

    info!("Preloading {} images with {} workers", unique.len(), workers);
    let start_time = std::time::Instant::now();

    let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
    let results: Vec<(ImageName, Result<RgbaImage>)> = pool.install(|| {
        unique
            .par_iter()
            .map(|request| {
                let result = load_image(
                    &request.path,
                    request.name.x,
                    request.name.y,
                    half_width,
                );
                debug!("Loaded {} ({})", request.name, if result.is_ok() { "ok" } else { "failed" });
                (request.name.clone(), result)
            })
            .collect()
    });

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!(
        "Preloaded {} images in {:.2}s ({} failed)",
        results.len() - failed,
        start_time.elapsed().as_secs_f64(),
        failed
    );

    Ok(results)
}

/// Splits batch results into loaded buffers and a report of failures.
pub fn split_results(
    results: Vec<(ImageName, Result<RgbaImage>)>,
) -> (Vec<(ImageName, RgbaImage)>, Vec<PreloadFailure>) {
    let mut loaded = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(image) => loaded.push((name, image)),
            Err(error) => {
                warn!("Failed to preload {}: {}", name, error);
                failed.push(PreloadFailure { name, error });
            }
        }
    }
    (loaded, failed)
}
