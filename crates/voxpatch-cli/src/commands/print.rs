//! Terminal rendering of reports.

use owo_colors::OwoColorize;
use voxpatch_core::{
    Error, PatchStatus, PatchTransaction, ResolutionReport, SiteState, SiteStatus, StatusReport,
    TargetResolution, format_hex_truncated,
};

pub fn resolution(report: &ResolutionReport) {
    println!(
        "Catalog {} | {} ({})",
        report.catalog_version, report.platform, report.format
    );
    println!();

    for target in &report.targets {
        match target {
            TargetResolution::Resolved(resolved) => {
                let va = resolved
                    .va
                    .map(|va| format!(" (va 0x{:X})", va))
                    .unwrap_or_default();
                let source = resolved
                    .source
                    .as_ref()
                    .map(|source| format!(" from {}", source))
                    .unwrap_or_default();
                println!(
                    "  {} {:<36} 0x{:08X}{}  {}{}",
                    "✓".green(),
                    resolved.target_id,
                    resolved.offset,
                    va,
                    resolved.method,
                    source
                );
            }
            TargetResolution::Unresolved(unresolved) => {
                println!("  {} {:<36} unresolved", "✗".red(), unresolved.target_id);
                for attempt in &unresolved.attempts {
                    println!("      {}", attempt.dimmed());
                }
            }
        }
    }

    let resolved = report.resolved().count();
    println!();
    println!("Resolved {}/{} targets", resolved, report.targets.len());
}

pub fn status(report: &StatusReport) {
    println!("Catalog {} | {}", report.catalog_version, report.platform);
    println!();

    for target in &report.targets {
        let offset = target
            .offset
            .map(|offset| format!("0x{:08X}", offset))
            .unwrap_or_else(|| "-".to_string());
        let label = match target.status {
            SiteStatus::Patched => target.status.green().to_string(),
            SiteStatus::Original => target.status.yellow().to_string(),
            SiteStatus::Foreign | SiteStatus::Unresolved => target.status.red().to_string(),
        };
        let observed = target
            .observed
            .as_ref()
            .map(|bytes| format_hex_truncated(bytes, 8))
            .unwrap_or_default();
        println!(
            "  {:<36} {:>10}  {:<10}  {}",
            target.target_id,
            offset,
            label,
            observed.dimmed()
        );
    }

    println!();
    let overall = match report.overall {
        PatchStatus::Patched => report.overall.green().bold().to_string(),
        PatchStatus::Unpatched => report.overall.yellow().bold().to_string(),
        PatchStatus::Partial => report.overall.red().bold().to_string(),
    };
    println!(
        "Status: {} ({} patched, {} original, {} foreign, {} unresolved)",
        overall,
        report.count(SiteStatus::Patched),
        report.count(SiteStatus::Original),
        report.count(SiteStatus::Foreign),
        report.count(SiteStatus::Unresolved)
    );
}

pub fn transaction(transaction: &PatchTransaction) {
    println!();
    for entry in transaction.entries() {
        let state = match entry.state {
            Some(SiteState::Original) => "write".green().to_string(),
            Some(SiteState::AlreadyApplied) => "already applied".dimmed().to_string(),
            None => "-".to_string(),
        };
        println!(
            "  {:<36} 0x{:08X}  {:>4} bytes  {}",
            entry.target_id,
            entry.offset,
            entry.new_bytes.len(),
            state
        );
    }
    println!();
    println!("Transaction: {}", transaction.status());
}

/// Every failure an error carries, one per line.
pub fn failures(error: &Error) {
    eprintln!();
    match error {
        Error::UnresolvedTargets(targets) => {
            for target in targets {
                eprintln!("  {} {}: {}", "✗".red(), target.target_id, target.summary());
            }
        }
        other => {
            for failure in other.failures() {
                eprintln!("  {} {}", "✗".red(), failure);
            }
        }
    }
}
