// Crop sizes
pub const IMAGE_MAX_SIZE: u32 = 2000;
pub const DEFAULT_CROP_HALF_WIDTH: u32 = IMAGE_MAX_SIZE / 2;

// Dataset layout
pub const IMAGES_DIR: &str = "images";
pub const WORLD_POINTS_FILE: &str = "world_points.json";
pub const SETTINGS_FILE: &str = "oblique_manager.ini";

// Spatial index sidecar files: <dataset>/rtree_index.dat and <dataset>/rtree_index.idx
pub const INDEX_BASENAME: &str = "rtree_index";
pub const INDEX_DATA_EXT: &str = "dat";
pub const INDEX_HEADER_EXT: &str = "idx";

// Bump whenever IndexRecord or IndexHeader change shape
pub const INDEX_FORMAT_VERSION: u32 = 1;
