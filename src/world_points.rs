//! World points exported from a structure-from-motion reconstruction.
//!
//! The manager only needs "given a dataset path, return world points", so the
//! reconstruction library sits behind [`WorldPointSource`]. [`JsonWorldPoints`]
//! reads the export from `<dataset>/world_points.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::constants::WORLD_POINTS_FILE;
use crate::error::{ObliqueError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// A source image a world point was observed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub image_id: String,
    pub x_px: f64,
    pub y_px: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub location: GeoLocation,
    pub images: Vec<Observation>,
}

/// World points keyed by reconstruction point id. Sorted so that index builds
/// from the same export are reproducible.
pub type WorldPoints = BTreeMap<String, WorldPoint>;

/// Anything that can produce the world points of a dataset.
pub trait WorldPointSource {
    fn world_points(&self, dataset_path: &Path) -> Result<WorldPoints>;
}

/// Reads world points from the JSON export written next to the reconstruction.
#[derive(Debug, Clone, Default)]
pub struct JsonWorldPoints;

impl WorldPointSource for JsonWorldPoints {
    fn world_points(&self, dataset_path: &Path) -> Result<WorldPoints> {
        let path = dataset_path.join(WORLD_POINTS_FILE);
        let file = File::open(&path).map_err(|e| {
            ObliqueError::WorldPoints(format!("cannot open {}: {}", path.display(), e))
        })?;
        let points: WorldPoints = serde_json::from_reader(BufReader::new(file))?;
        Ok(points)
    }
}

/// An in-memory set of world points, for callers that already hold the export.
impl WorldPointSource for WorldPoints {
    fn world_points(&self, _dataset_path: &Path) -> Result<WorldPoints> {
        Ok(self.clone())
    }
}

/// Writes world points in the layout [`JsonWorldPoints`] reads.
pub fn save_world_points(dataset_path: &Path, points: &WorldPoints) -> Result<()> {
    let path = dataset_path.join(WORLD_POINTS_FILE);
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, points)?;
    Ok(())
}
