//! Catalog command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use voxpatch_core::resolver::format_delta;
use voxpatch_core::{Payload, Platform, save_catalog};

use super::load_catalog_or_builtin;

/// Run the catalog command
pub fn run(catalog: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let catalog = load_catalog_or_builtin(catalog)?;

    println!("Catalog version: {}", catalog.version);
    println!();
    for target in &catalog.targets {
        let platforms: Vec<String> = target.variants.keys().map(ToString::to_string).collect();
        let payload = target
            .variants
            .values()
            .next()
            .map(|variant| match &variant.payload {
                Payload::Bytes { bytes } => format!("{} byte(s)", bytes.len()),
                Payload::InjectedBody { slot_len } => format!("slot 0x{:X}", slot_len),
            })
            .unwrap_or_default();
        println!(
            "  {:<36} {:<10} {:<16} {}",
            target.id,
            target.category,
            platforms.join(","),
            payload
        );
    }

    for platform in [
        Platform::Windows,
        Platform::Linux,
        Platform::MacOs,
        Platform::MacOsArm64,
    ] {
        let rules = catalog.rules_for(platform);
        if rules.is_empty() {
            continue;
        }
        println!();
        println!("Derivations ({}):", platform);
        for rule in rules {
            println!(
                "  {} -> {} {}  {}",
                rule.from,
                rule.to,
                format_delta(rule.delta),
                rule.description
            );
        }
    }

    if let Some(path) = output {
        save_catalog(path, &catalog)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!();
        println!("Catalog exported to {}", path.display());
    }

    Ok(())
}
