use image::{ImageReader, RgbaImage};
use std::path::Path;

use crate::error::{ObliqueError, Result};

/// Pixel rectangle `[x1, x2) × [y1, y2)` inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropWindow {
    /// Square window of half-width `half_width` around `(px, py)`, clamped to
    /// a `width × height` image. Returns `None` when nothing of the window is
    /// inside the image.
    pub fn around(px: i64, py: i64, half_width: u32, width: u32, height: u32) -> Option<Self> {
        let win = i64::from(half_width);
        let clamp_x = |v: i64| v.clamp(0, i64::from(width)) as u32;
        let clamp_y = |v: i64| v.clamp(0, i64::from(height)) as u32;

        let window = CropWindow {
            x1: clamp_x(px.saturating_sub(win)),
            y1: clamp_y(py.saturating_sub(win)),
            x2: clamp_x(px.saturating_add(win)),
            y2: clamp_y(py.saturating_add(win)),
        };

        if window.width() == 0 || window.height() == 0 {
            return None;
        }
        Some(window)
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Top-left corner of the crop window around `(px, py)`.
///
/// Only the lower clamp is applied, which is all that is needed to map a
/// position in the crop back to the full image.
pub fn crop_origin(px: i64, py: i64, half_width: u32) -> (u32, u32) {
    let win = i64::from(half_width);
    let origin = |v: i64| v.saturating_sub(win).clamp(0, i64::from(u32::MAX)) as u32;
    (origin(px), origin(py))
}

/// Opens and decodes an image file.
pub fn decode_image(path: &Path) -> Result<image::DynamicImage> {
    let decode_error = |source: image::ImageError| ObliqueError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_error)
}

/// Loads the crop of `path` centered on `(px, py)` as RGBA.
///
/// Safe to call from worker threads: it touches nothing but the file.
pub fn load_image(path: &Path, px: i64, py: i64, half_width: u32) -> Result<RgbaImage> {
    let img = decode_image(path)?;

    let window = CropWindow::around(px, py, half_width, img.width(), img.height()).ok_or_else(|| {
        ObliqueError::EmptyCrop {
            image_id: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            x: px,
            y: py,
        }
    })?;

    let cropped = img.crop_imm(window.x1, window.y1, window.width(), window.height());
    Ok(cropped.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_window_in_interior_is_full_size() {
        let window = CropWindow::around(500, 500, 100, 1000, 1000).unwrap();
        assert_eq!(window, CropWindow { x1: 400, y1: 400, x2: 600, y2: 600 });
    }

    #[test]
    fn test_window_clamped_at_edges() {
        let window = CropWindow::around(10, 990, 100, 1000, 1000).unwrap();
        assert_eq!(window, CropWindow { x1: 0, y1: 890, x2: 110, y2: 1000 });
        assert!(window.width() <= 200 && window.height() <= 200);
    }

    #[test]
    fn test_window_outside_image() {
        assert!(CropWindow::around(5000, 10, 100, 1000, 1000).is_none());
        assert!(CropWindow::around(-150, 10, 100, 1000, 1000).is_none());
    }

    #[test]
    fn test_window_at_extreme_pixels() {
        assert!(CropWindow::around(i64::MAX, 0, 100, 10, 10).is_none());
        assert!(CropWindow::around(0, i64::MIN, 100, 10, 10).is_none());
        assert!(CropWindow::around(i64::MIN, 5, 100, 10, 10).is_none());
    }

    #[test]
    fn test_crop_origin_clamps_at_zero() {
        assert_eq!(crop_origin(50, 2000, 1000), (0, 1000));
    }

    #[test]
    fn test_crop_origin_at_extreme_pixels() {
        assert_eq!(crop_origin(i64::MIN, 0, 100), (0, 0));
        assert_eq!(crop_origin(i64::MAX, 0, 100), (u32::MAX, 0));
    }

    #[test]
    fn test_load_image_far_outside_is_empty_crop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.png");
        RgbImage::new(10, 10).save(&path).unwrap();

        let name: crate::image_name::ImageName = "small.png_9223372036854775807_0".parse().unwrap();
        let err = load_image(&path, name.x, name.y, 100).unwrap_err();
        assert!(matches!(err, ObliqueError::EmptyCrop { .. }));
    }

    #[test]
    fn test_load_image_crops_and_converts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src.png");
        RgbImage::from_pixel(64, 48, Rgb([10, 20, 30])).save(&path).unwrap();

        let crop = load_image(&path, 60, 5, 8).unwrap();
        assert_eq!(crop.dimensions(), (12, 13));
        assert_eq!(crop.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_load_image_reports_decode_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let err = load_image(&path, 0, 0, 8).unwrap_err();
        assert!(matches!(err, ObliqueError::ImageDecode { .. }));
    }

    #[test]
    fn test_load_image_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_image(&dir.path().join("nope.png"), 0, 0, 8).unwrap_err();
        assert!(matches!(err, ObliqueError::ImageDecode { .. }));
    }
}
