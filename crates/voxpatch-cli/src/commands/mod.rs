//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod apply;
pub mod args;
pub mod catalog;
pub mod print;
pub mod resolve;
pub mod restore;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use voxpatch_core::{BinaryImage, Catalog, Config, Engine, builtin_catalog, load_catalog};

/// Load the catalog at `path`, or the built-in one.
pub fn load_catalog_or_builtin(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => {
            let catalog = load_catalog(path)
                .with_context(|| format!("Failed to load catalog from {}", path.display()))?;
            info!("Loaded catalog version {} from {:?}", catalog.version, path);
            Ok(catalog)
        }
        None => Ok(builtin_catalog()?),
    }
}

pub fn load_engine(catalog: Option<&Path>, config: Config) -> Result<Engine> {
    Ok(Engine::new(load_catalog_or_builtin(catalog)?, config)?)
}

pub fn open_image(path: &Path) -> Result<BinaryImage> {
    BinaryImage::open(path).with_context(|| format!("Failed to open {}", path.display()))
}
