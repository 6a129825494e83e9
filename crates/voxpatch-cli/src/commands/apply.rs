//! Apply command implementation.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::info;
use voxpatch_core::{Config, Engine, InjectedFunctionBody, Platform};

use super::args::{BodyArg, parse_body_arg};
use super::{load_engine, open_image, print};

/// Run the apply command
pub fn run(
    file: &Path,
    catalog: Option<&Path>,
    body_args: &[String],
    dry_run: bool,
    restore_point: Option<&Path>,
    config: Config,
) -> Result<()> {
    let engine = load_engine(catalog, config)?;
    let mut image = open_image(file)?;
    let bodies = load_bodies(&engine, image.platform(), body_args)?;

    let reports = engine.resolve(&image)?;
    for report in &reports {
        print::resolution(report);
    }
    for report in &reports {
        if let Err(e) = report.ensure_complete() {
            print::failures(&e);
            return Err(e.into());
        }
    }

    if dry_run {
        let transaction = engine.prepare(&image, &reports, &bodies).inspect_err(print::failures)?;
        print::transaction(&transaction);
        println!("Dry run: nothing written");
        return Ok(());
    }

    let outcome = engine
        .apply_resolved(&mut image, reports, &bodies)
        .inspect_err(print::failures)?;
    print::transaction(&outcome.transaction);

    if let Some(path) = restore_point {
        match outcome.transaction.restore_point() {
            Some(point) if !point.ranges.is_empty() => {
                point
                    .save(path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Restore point saved to {}", path.display());
            }
            _ => println!("Nothing was written, no restore point saved"),
        }
    }

    Ok(())
}

/// Load every `ID[@PLATFORM]=PATH` body, sized to its slot. A body without
/// a platform is sized for `primary` and offered to every slice.
pub fn load_bodies(
    engine: &Engine,
    primary: Platform,
    body_args: &[String],
) -> Result<Vec<InjectedFunctionBody>> {
    body_args
        .iter()
        .map(|arg| {
            let BodyArg { id, platform, path } = parse_body_arg(arg)?;
            let sized_for = platform.unwrap_or(primary);
            let slot_len = engine
                .slot_len(sized_for, &id)
                .ok_or_else(|| anyhow!("{} is not an injection target on {}", id, sized_for))?;
            let mut body = InjectedFunctionBody::from_file(&id, &path, slot_len)
                .with_context(|| format!("Failed to read body {}", path.display()))?;
            if let Some(platform) = platform {
                body = body.for_platform(platform);
            }
            info!("Body for {} on {}: {} of {} bytes", id, sized_for, body.len(), slot_len);
            Ok(body)
        })
        .collect()
}
