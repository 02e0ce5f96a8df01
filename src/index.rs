//! Persisted 2-D R-tree over world point locations.
//!
//! Each record sits at `(lon, lat)` and carries the images the world point was
//! observed in. The tree is built once from the dataset's world points and
//! stored next to the dataset as two sidecar files:
//!
//! - `rtree_index.idx`: header with format version, record count and bounds
//! - `rtree_index.dat`: the records themselves
//!
//! Opening bulk-loads the records back into an `rstar` tree.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{INDEX_DATA_EXT, INDEX_FORMAT_VERSION, INDEX_HEADER_EXT};
use crate::error::{ObliqueError, Result};
use crate::image_name::ImageName;
use crate::utils::write_atomically;
use crate::world_points::{Observation, WorldPointSource, WorldPoints};

/// One image a record was observed in, with its pixel position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub image_id: String,
    pub x_px: f64,
    pub y_px: f64,
    pub x_px_int: i64,
    pub y_px_int: i64,
}

impl ImageRef {
    pub fn from_observation(obs: &Observation) -> Self {
        // Half-to-even, so x.5 pixels land where the reconstruction tools put them
        Self {
            image_id: obs.image_id.clone(),
            x_px: obs.x_px,
            y_px: obs.y_px,
            x_px_int: obs.x_px.round_ties_even() as i64,
            y_px_int: obs.y_px.round_ties_even() as i64,
        }
    }

    pub fn name(&self) -> ImageName {
        ImageName::new(self.image_id.clone(), self.x_px_int, self.y_px_int)
    }
}

/// A world point as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub key: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub images: Vec<ImageRef>,
}

impl IndexRecord {
    pub fn image_names(&self) -> Vec<ImageName> {
        self.images.iter().map(ImageRef::name).collect()
    }
}

impl RTreeObject for IndexRecord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lon, self.lat])
    }
}

impl PointDistance for IndexRecord {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlon = self.lon - point[0];
        let dlat = self.lat - point[1];
        dlon * dlon + dlat * dlat
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexHeader {
    version: u32,
    record_count: u64,
    // [min_lon, min_lat, max_lon, max_lat]
    bounds: Option<[f64; 4]>,
}

/// Builds index records from world points, in key order.
pub fn records_from_world_points(points: &WorldPoints) -> Vec<IndexRecord> {
    points
        .iter()
        .filter_map(|(key, point)| {
            let loc = point.location;
            if !loc.lat.is_finite() || !loc.lon.is_finite() {
                warn!("Skipping world point {} with non-finite location", key);
                return None;
            }
            Some(IndexRecord {
                key: key.clone(),
                lat: loc.lat,
                lon: loc.lon,
                alt: loc.alt,
                images: point.images.iter().map(ImageRef::from_observation).collect(),
            })
        })
        .collect()
}

fn bounds_of(records: &[IndexRecord]) -> Option<[f64; 4]> {
    records.iter().fold(None, |acc, r| {
        Some(match acc {
            None => [r.lon, r.lat, r.lon, r.lat],
            Some([min_lon, min_lat, max_lon, max_lat]) => [
                min_lon.min(r.lon),
                min_lat.min(r.lat),
                max_lon.max(r.lon),
                max_lat.max(r.lat),
            ],
        })
    })
}

/// Read-only spatial index of world points.
pub struct AerialIndex {
    tree: RTree<IndexRecord>,
}

impl AerialIndex {
    pub fn data_path(base_path: &Path) -> PathBuf {
        base_path.with_extension(INDEX_DATA_EXT)
    }

    pub fn header_path(base_path: &Path) -> PathBuf {
        base_path.with_extension(INDEX_HEADER_EXT)
    }

    /// Whether an index has been persisted at `base_path`. Only the data file
    /// is checked; a missing header is caught by [`AerialIndex::open`].
    pub fn exists(base_path: &Path) -> bool {
        Self::data_path(base_path).exists()
    }

    /// Builds the index from world points and writes both sidecar files.
    pub fn build(base_path: &Path, points: &WorldPoints) -> Result<usize> {
        let records = records_from_world_points(points);
        let header = IndexHeader {
            version: INDEX_FORMAT_VERSION,
            record_count: records.len() as u64,
            bounds: bounds_of(&records),
        };

        // Header first: a data file on disk implies its header was written
        write_atomically(&Self::header_path(base_path), &bincode::serialize(&header)?)?;
        write_atomically(&Self::data_path(base_path), &bincode::serialize(&records)?)?;

        info!(
            "Wrote spatial index with {} points to {}",
            records.len(),
            Self::data_path(base_path).display()
        );
        Ok(records.len())
    }

    /// Opens a persisted index. Any problem with the sidecar files is reported
    /// as [`ObliqueError::IndexUnavailable`].
    pub fn open(base_path: &Path) -> Result<Self> {
        let (header, records) = read_records(base_path).map_err(|e| {
            ObliqueError::IndexUnavailable {
                path: Self::data_path(base_path),
                reason: e.to_string(),
            }
        })?;
        if let Some([min_lon, min_lat, max_lon, max_lat]) = header.bounds {
            debug!(
                "Index covers lon {:.6}..{:.6}, lat {:.6}..{:.6}",
                min_lon, max_lon, min_lat, max_lat
            );
        }

        Ok(AerialIndex {
            tree: RTree::bulk_load(records),
        })
    }

    /// Opens the index at `base_path`, building it from `source` first when it
    /// is missing or unreadable.
    pub fn open_or_build(
        base_path: &Path,
        dataset_path: &Path,
        source: &dyn WorldPointSource,
    ) -> Result<Self> {
        if Self::exists(base_path) {
            match Self::open(base_path) {
                Ok(index) => {
                    info!("Opened spatial index with {} points", index.len());
                    return Ok(index);
                }
                Err(e) => {
                    warn!("Discarding unreadable spatial index: {}", e);
                    for path in [Self::data_path(base_path), Self::header_path(base_path)] {
                        if let Err(e) = std::fs::remove_file(&path) {
                            if e.kind() != std::io::ErrorKind::NotFound {
                                warn!("Failed to remove {}: {}", path.display(), e);
                            }
                        }
                    }
                }
            }
        }

        info!("Building oblique SfM rtree from {}", dataset_path.display());
        let points = source.world_points(dataset_path)?;
        Self::build(base_path, &points)?;
        Self::open(base_path)
    }

    /// Record closest to `(lon, lat)`, or `None` when the index is empty.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<&IndexRecord> {
        self.tree.nearest_neighbor(&[lon, lat])
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn records(&self) -> impl Iterator<Item = &IndexRecord> {
        self.tree.iter()
    }
}

fn read_records(base_path: &Path) -> Result<(IndexHeader, Vec<IndexRecord>)> {
    let header_file = File::open(AerialIndex::header_path(base_path))?;
    let header: IndexHeader = bincode::deserialize_from(BufReader::new(header_file))?;
    if header.version != INDEX_FORMAT_VERSION {
        return Err(ObliqueError::IndexUnavailable {
            path: AerialIndex::header_path(base_path),
            reason: format!(
                "format version mismatch (found {}, expected {})",
                header.version, INDEX_FORMAT_VERSION
            ),
        });
    }

    let data_file = File::open(AerialIndex::data_path(base_path))?;
    let records: Vec<IndexRecord> = bincode::deserialize_from(BufReader::new(data_file))?;
    if records.len() as u64 != header.record_count {
        return Err(ObliqueError::IndexUnavailable {
            path: AerialIndex::data_path(base_path),
            reason: format!(
                "record count mismatch (header {}, data {})",
                header.record_count,
                records.len()
            ),
        });
    }

    Ok((header, records))
}
