//! Status command implementation.

use std::path::Path;

use anyhow::Result;
use voxpatch_core::Config;

use super::{load_engine, open_image, print};

/// Run the status command
pub fn run(file: &Path, catalog: Option<&Path>, config: Config) -> Result<()> {
    let engine = load_engine(catalog, config)?;
    let image = open_image(file)?;
    for report in engine.status(&image)? {
        print::status(&report);
    }
    Ok(())
}
