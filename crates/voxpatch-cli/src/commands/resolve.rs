//! Resolve command implementation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use voxpatch_core::Config;

use super::{load_engine, open_image, print};

/// Run the resolve command
pub fn run(file: &Path, catalog: Option<&Path>, export: Option<&Path>, config: Config) -> Result<()> {
    let engine = load_engine(catalog, config)?;
    let image = open_image(file)?;
    let reports = engine.resolve(&image)?;

    for report in &reports {
        print::resolution(report);
    }

    if let Some(path) = export {
        let json = serde_json::to_string_pretty(&reports)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported report to {}", path.display());
    }

    for report in &reports {
        report.ensure_complete()?;
    }
    Ok(())
}
