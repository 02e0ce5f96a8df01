//! Finds oblique aerial images that show a geographic location and serves
//! cropped pixel buffers of them to an annotation GUI.
//!
//! A 2-D R-tree over the world points of a structure-from-motion
//! reconstruction is built once and persisted next to the dataset. Queries
//! return the image bundle of the nearest world point; the images are cropped
//! around the observed pixel and cached for the rest of the session.
//!
//! ```no_run
//! use oblique_manager::ObliqueManager;
//!
//! let mut manager = ObliqueManager::new("/data/survey", true)?;
//! for name in manager.get_candidates(Some(40.01), Some(-105.27))? {
//!     let (height, width) = manager.get_image_size(&name)?;
//!     println!("{name}: {width}x{height}");
//! }
//! # Ok::<(), oblique_manager::ObliqueError>(())
//! ```

pub mod cache;
pub mod constants;
pub mod error;
pub mod image_name;
pub mod image_processing;
pub mod index;
pub mod manager;
pub mod preload;
pub mod settings;
pub mod utils;
pub mod world_points;

pub use cache::ImageCache;
pub use error::{ObliqueError, Result};
pub use image_name::ImageName;
pub use index::{AerialIndex, ImageRef, IndexRecord};
pub use manager::ObliqueManager;
pub use preload::{PreloadFailure, PreloadReport};
pub use settings::Settings;
pub use world_points::{GeoLocation, JsonWorldPoints, Observation, WorldPoint, WorldPointSource, WorldPoints};
