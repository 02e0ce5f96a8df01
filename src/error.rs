//! Error types for index building, candidate queries and image loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::image_name::ImageName;

/// Errors reported by the oblique image manager.
#[derive(Debug, Error)]
pub enum ObliqueError {
    /// The spatial index could neither be opened nor built.
    #[error("spatial index unavailable at {path}: {reason}")]
    IndexUnavailable { path: PathBuf, reason: String },

    /// The index holds no entry that could serve the query.
    #[error("no candidate images near lat {lat}, lon {lon}")]
    NoCandidates { lat: f64, lon: f64 },

    /// An image file could not be opened or decoded.
    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The crop window around the requested pixel does not overlap the image.
    #[error("crop window around ({x}, {y}) lies outside image {image_id}")]
    EmptyCrop { image_id: String, x: i64, y: i64 },

    #[error("image {0} is not cached")]
    NotCached(ImageName),

    #[error("invalid image name: {0}")]
    InvalidImageName(String),

    /// The world-point export of the dataset failed.
    #[error("world point export failed: {0}")]
    WorldPoints(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ObliqueError {
    /// Returns `true` when the query simply found nothing, as opposed to a failure.
    pub fn is_no_candidates(&self) -> bool {
        matches!(self, Self::NoCandidates { .. })
    }
}

pub type Result<T> = std::result::Result<T, ObliqueError>;
