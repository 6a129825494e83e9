//! Restore command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use voxpatch_core::{RestorePoint, restore};

use super::open_image;

/// Run the restore command
pub fn run(file: &Path, restore_point: &Path) -> Result<()> {
    let point = RestorePoint::load(restore_point)
        .with_context(|| format!("Failed to read restore point {}", restore_point.display()))?;
    let mut image = open_image(file)?;

    restore(&mut image, &point)?;

    println!(
        "Restored {} range(s) captured at {} (catalog {})",
        point.ranges.len(),
        point.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
        point.catalog_version
    );
    Ok(())
}
