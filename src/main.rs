use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use oblique_manager::{JsonWorldPoints, ObliqueManager, Settings};

fn usage() -> &'static str {
    "usage: oblique_manager <dataset_path> [<lat> <lon>]"
}

fn parse_coord(value: &str, label: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .with_context(|| format!("Invalid {}: {}", label, value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (dataset_path, location) = match args.as_slice() {
        [path] => (PathBuf::from(path), None),
        [path, lat, lon] => (
            PathBuf::from(path),
            Some((parse_coord(lat, "latitude")?, parse_coord(lon, "longitude")?)),
        ),
        _ => bail!(usage()),
    };

    if !dataset_path.is_dir() {
        bail!("Dataset directory not found: {}", dataset_path.display());
    }

    let settings = Settings::load(&dataset_path)
        .with_context(|| format!("Failed to read settings in {}", dataset_path.display()))?;
    let mut manager = ObliqueManager::with_source(&dataset_path, settings, &JsonWorldPoints)
        .with_context(|| format!("Failed to open spatial index for {}", dataset_path.display()))?;

    println!(
        "🗺️  Spatial index for {}: {} world points ({} preload workers)",
        manager.dataset_path().display(),
        manager.index().len(),
        manager.settings().workers()
    );

    let Some((lat, lon)) = location else {
        return Ok(());
    };

    let names = match manager.get_candidates(Some(lat), Some(lon)) {
        Ok(names) => names,
        Err(e) if e.is_no_candidates() => {
            println!("❌ No candidate images near {}, {}", lat, lon);
            return Ok(());
        }
        Err(e) => return Err(e).context("Candidate query failed"),
    };

    println!("📸 {} candidate images near {}, {}", names.len(), lat, lon);
    for name in &names {
        if manager.is_cached(name) {
            let (x1, y1) = manager.get_offsets(name)?;
            let (height, width) = manager.get_image_size(name)?;
            println!("   ✅ {} crop {}x{} at ({}, {})", name, width, height, x1, y1);
        } else {
            println!("   ⏳ {}", name);
        }
    }

    Ok(())
}
