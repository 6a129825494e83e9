use std::sync::OnceLock;

use super::Catalog;
use crate::error::Result;

const BUILTIN_JSON: &str = include_str!("builtin.json");

/// The catalog shipped with the crate, parsed and validated once.
pub fn builtin_catalog() -> Result<Catalog> {
    static PARSED: OnceLock<std::result::Result<Catalog, String>> = OnceLock::new();

    let parsed = PARSED.get_or_init(|| {
        let catalog: Catalog = serde_json::from_str(BUILTIN_JSON).map_err(|e| e.to_string())?;
        catalog.validate().map_err(|e| e.to_string())?;
        Ok(catalog)
    });

    parsed
        .clone()
        .map_err(|e| crate::error::Error::Catalog(format!("builtin catalog: {}", e)))
}
