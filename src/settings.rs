use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_CROP_HALF_WIDTH, SETTINGS_FILE};
use crate::error::Result;
use crate::utils::{available_workers, ensure_directory_exists};

/// Per-dataset manager settings, read from `<dataset>/oblique_manager.ini`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub preload_images: bool,
    pub crop_half_width: u32,
    /// Preload workers; `None` means one per core.
    pub worker_threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preload_images: true,
            crop_half_width: DEFAULT_CROP_HALF_WIDTH,
            worker_threads: None,
        }
    }
}

impl Settings {
    /// Loads settings for a dataset. A missing file yields the defaults, and
    /// values that fail to parse keep their default.
    pub fn load(dataset_path: &Path) -> Result<Self> {
        let config_path = Self::config_path(dataset_path);
        let mut settings = Settings::default();
        if !config_path.exists() {
            return Ok(settings);
        }

        let file = File::open(&config_path)?;
        let reader = BufReader::new(file);
        let mut config_map = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config_map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        if let Some(preload_str) = config_map.get("preload_images") {
            if let Ok(preload) = preload_str.parse::<bool>() {
                settings.preload_images = preload;
            }
        }
        if let Some(width_str) = config_map.get("crop_half_width") {
            if let Ok(width) = width_str.parse::<u32>() {
                settings.crop_half_width = width;
            }
        }
        if let Some(workers_str) = config_map.get("worker_threads") {
            if let Ok(workers) = workers_str.parse::<usize>() {
                settings.worker_threads = (workers > 0).then_some(workers);
            }
        }

        Ok(settings)
    }

    pub fn save(&self, dataset_path: &Path) -> Result<()> {
        let config_path = Self::config_path(dataset_path);
        if let Some(parent) = config_path.parent() {
            ensure_directory_exists(parent)?;
        }

        let mut content = String::new();
        content.push_str("# Oblique manager settings\n");
        content.push_str(&format!("preload_images = {}\n", self.preload_images));
        content.push_str(&format!("crop_half_width = {}\n", self.crop_half_width));
        if let Some(workers) = self.worker_threads {
            content.push_str(&format!("worker_threads = {}\n", workers));
        }

        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn workers(&self) -> usize {
        self.worker_threads.unwrap_or_else(available_workers)
    }

    pub fn config_path(dataset_path: &Path) -> PathBuf {
        dataset_path.join(SETTINGS_FILE)
    }
}
