use image::{Rgb, RgbImage};
use oblique_manager::constants::{IMAGES_DIR, INDEX_BASENAME};
use oblique_manager::world_points::save_world_points;
use oblique_manager::{
    AerialIndex, GeoLocation, ImageName, JsonWorldPoints, ObliqueError, ObliqueManager, Observation, Settings,
    WorldPoint, WorldPointSource, WorldPoints,
};
use std::path::Path;
use tempfile::TempDir;

const HALF_WIDTH: u32 = 100;

fn write_image(dataset: &Path, image_id: &str, width: u32, height: u32) {
    let dir = dataset.join(IMAGES_DIR);
    std::fs::create_dir_all(&dir).unwrap();
    RgbImage::from_pixel(width, height, Rgb([120, 80, 40]))
        .save(dir.join(image_id))
        .unwrap();
}

fn world_point(lat: f64, lon: f64, images: &[(&str, f64, f64)]) -> WorldPoint {
    WorldPoint {
        location: GeoLocation { lat, lon, alt: 1600.0 },
        images: images
            .iter()
            .map(|(id, x, y)| Observation {
                image_id: id.to_string(),
                x_px: *x,
                y_px: *y,
            })
            .collect(),
    }
}

/// Three world points over four 400x300 images.
fn create_dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    for id in ["north.png", "south.png", "east.png", "west.png"] {
        write_image(dir.path(), id, 400, 300);
    }

    let mut points = WorldPoints::new();
    points.insert(
        "100".into(),
        world_point(40.015, -105.27, &[("north.png", 50.2, 250.0), ("east.png", 200.0, 150.0)]),
    );
    points.insert(
        "101".into(),
        world_point(40.020, -105.28, &[("south.png", 390.0, 10.0)]),
    );
    points.insert(
        "102".into(),
        world_point(40.010, -105.26, &[("west.png", 10.0, 10.0), ("north.png", 300.0, 40.0), ("east.png", 5.0, 295.0)]),
    );
    save_world_points(dir.path(), &points).unwrap();
    dir
}

fn settings(preload_images: bool) -> Settings {
    Settings {
        preload_images,
        crop_half_width: HALF_WIDTH,
        worker_threads: Some(2),
    }
}

struct FailingSource;

impl WorldPointSource for FailingSource {
    fn world_points(&self, _dataset_path: &Path) -> oblique_manager::Result<WorldPoints> {
        Err(ObliqueError::WorldPoints("reconstruction not available".into()))
    }
}

#[test]
fn test_builds_index_on_first_open() {
    let dir = create_dataset();
    let base = dir.path().join(INDEX_BASENAME);
    assert!(!AerialIndex::exists(&base));

    let manager = ObliqueManager::new(dir.path(), false).unwrap();
    assert_eq!(manager.index().len(), 3);
    assert!(AerialIndex::data_path(&base).exists());
    assert!(AerialIndex::header_path(&base).exists());
}

#[test]
fn test_persisted_index_is_reused() {
    let dir = create_dataset();
    ObliqueManager::new(dir.path(), false).unwrap();

    // The world point source is never consulted once the index exists
    let manager = ObliqueManager::with_source(dir.path(), settings(false), &FailingSource).unwrap();
    assert_eq!(manager.index().len(), 3);
}

#[test]
fn test_missing_index_and_source_failure_propagates() {
    let dir = create_dataset();
    let err = ObliqueManager::with_source(dir.path(), settings(false), &FailingSource)
        .err()
        .unwrap();
    assert!(matches!(err, ObliqueError::WorldPoints(_)));
}

#[test]
fn test_exact_coordinate_returns_bundle() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    let names = manager.get_candidates(Some(40.010), Some(-105.26)).unwrap();
    assert_eq!(
        names,
        vec![
            ImageName::new("west.png", 10, 10),
            ImageName::new("north.png", 300, 40),
            ImageName::new("east.png", 5, 295),
        ]
    );
    assert_eq!(manager.candidates().len(), 3);
    assert!(manager.cache().is_empty());
}

#[test]
fn test_missing_coordinate_returns_empty() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(true), &JsonWorldPoints).unwrap();

    assert!(manager.get_candidates(None, Some(-105.27)).unwrap().is_empty());
    assert!(manager.get_candidates(Some(40.015), None).unwrap().is_empty());
    assert!(manager.get_candidates(None, None).unwrap().is_empty());
    assert!(manager.cache().is_empty());
}

#[test]
fn test_non_finite_coordinate_returns_empty() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(true), &JsonWorldPoints).unwrap();

    assert!(manager.get_candidates(Some(f64::NAN), Some(1.0)).unwrap().is_empty());
    assert!(manager.get_candidates(Some(40.0), Some(f64::INFINITY)).unwrap().is_empty());
    assert!(manager.candidates().is_empty());
    assert!(manager.cache().is_empty());
}

#[test]
fn test_extreme_pixel_name_is_empty_crop() {
    let dir = create_dataset();
    write_image(dir.path(), "a.png", 10, 10);
    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    let name: ImageName = "a.png_9223372036854775807_0".parse().unwrap();
    let err = manager.get_image(&name).unwrap_err();
    assert!(matches!(err, ObliqueError::EmptyCrop { .. }));
    assert!(!manager.is_cached(&name));
}

#[test]
fn test_empty_index_distinguishes_no_candidates() {
    let dir = TempDir::new().unwrap();
    let mut manager =
        ObliqueManager::with_source(dir.path(), settings(true), &WorldPoints::new()).unwrap();

    assert!(manager.get_candidates(None, Some(1.0)).unwrap().is_empty());
    let err = manager.get_candidates(Some(1.0), Some(2.0)).unwrap_err();
    assert!(err.is_no_candidates());
}

#[test]
fn test_preload_populates_cache_and_offsets() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(true), &JsonWorldPoints).unwrap();

    let names = manager.get_candidates(Some(40.010), Some(-105.26)).unwrap();
    assert_eq!(manager.cache().len(), names.len());
    assert_eq!(manager.cache().offset_count(), names.len());
    for name in &names {
        assert!(manager.is_cached(name));
    }
}

#[test]
fn test_preload_skips_cached_images() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    manager.get_candidates(Some(40.015), Some(-105.27)).unwrap();
    let first = manager.preload_images().unwrap();
    assert_eq!(first.loaded.len(), 2);
    assert_eq!(first.skipped, 0);

    let second = manager.preload_images().unwrap();
    assert!(second.loaded.is_empty());
    assert_eq!(second.skipped, 2);
    assert_eq!(manager.cache().len(), 2);
}

#[test]
fn test_bad_image_is_reported_not_fatal() {
    let dir = create_dataset();
    std::fs::write(dir.path().join(IMAGES_DIR).join("east.png"), b"truncated").unwrap();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    manager.get_candidates(Some(40.015), Some(-105.27)).unwrap();
    let report = manager.preload_images().unwrap();
    assert_eq!(report.loaded, vec![ImageName::new("north.png", 50, 250)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, ImageName::new("east.png", 200, 150));
    assert!(matches!(report.failed[0].error, ObliqueError::ImageDecode { .. }));
    assert_eq!(manager.cache().len(), 1);
}

#[test]
fn test_crop_near_edge_is_clamped() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    let name = ImageName::new("north.png", 50, 250);
    let (height, width) = manager.get_image_size(&name).unwrap();
    // x: [0, 150), y: [150, 300)
    assert_eq!((height, width), (150, 150));
    assert!(width <= 2 * HALF_WIDTH && height <= 2 * HALF_WIDTH);
}

#[test]
fn test_offsets_map_back_to_full_image() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    let name = ImageName::new("north.png", 50, 250);
    manager.get_image(&name).unwrap();

    assert_eq!(manager.get_offsets(&name).unwrap(), (0, 150));
    assert_eq!(manager.feature_position(&name).unwrap(), (50, 100));
    assert_eq!(manager.to_full_image_coords(&name, 10.0, 20.0).unwrap(), (10.0, 170.0));

    let interior = ImageName::new("east.png", 200, 150);
    manager.get_image(&interior).unwrap();
    assert_eq!(manager.get_offsets(&interior).unwrap(), (100, 50));
    assert_eq!(manager.feature_position(&interior).unwrap(), (100, 100));
}

#[test]
fn test_offsets_of_uncached_image() {
    let dir = create_dataset();
    let manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    let err = manager.get_offsets(&ImageName::new("north.png", 1, 1)).unwrap_err();
    assert!(matches!(err, ObliqueError::NotCached(_)));
}

#[test]
fn test_gui_name_string_round_trip() {
    let dir = create_dataset();
    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    let names = manager.get_candidates(Some(40.020), Some(-105.28)).unwrap();
    let shown = names[0].to_string();
    assert_eq!(shown, "south.png_390_10");

    let name: ImageName = shown.parse().unwrap();
    let image = manager.get_image(&name).unwrap();
    assert_eq!(image.dimensions(), (110, 110));
    assert_eq!(image.get_pixel(0, 0).0, [120, 80, 40, 255]);
}

#[test]
fn test_rebuild_gives_identical_results() {
    let dir = create_dataset();
    let base = dir.path().join(INDEX_BASENAME);

    let queries = [(40.0151, -105.2702), (40.03, -105.3), (40.0, -105.0)];
    let mut before = Vec::new();
    {
        let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();
        for (lat, lon) in queries {
            before.push(manager.get_candidates(Some(lat), Some(lon)).unwrap());
        }
    }
    let data_before = std::fs::read(AerialIndex::data_path(&base)).unwrap();

    std::fs::remove_file(AerialIndex::data_path(&base)).unwrap();
    std::fs::remove_file(AerialIndex::header_path(&base)).unwrap();

    let mut manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();
    for ((lat, lon), expected) in queries.iter().zip(&before) {
        assert_eq!(&manager.get_candidates(Some(*lat), Some(*lon)).unwrap(), expected);
    }
    assert_eq!(std::fs::read(AerialIndex::data_path(&base)).unwrap(), data_before);
}

#[test]
fn test_latlons_and_nearest_feature_are_empty() {
    let dir = create_dataset();
    let manager = ObliqueManager::with_source(dir.path(), settings(false), &JsonWorldPoints).unwrap();

    assert!(manager.load_latlons().is_empty());
    assert!(manager
        .get_nearest_feature(&ImageName::new("north.png", 50, 250), 3.0, 4.0)
        .is_none());
}
