//! All-or-nothing application of resolved patches.
//!
//! ```text
//! Pending --validate--> Validated --commit--> Applied --rollback--> RolledBack
//!    |                      |                    |
//!    +------ failure -------+----- failure ------+--> Failed
//! ```
//!
//! Nothing reaches storage before every site has been validated, and a
//! commit flushes exactly once. A transaction may span several slices of a
//! universal image; they are validated and committed together. At most one transaction may be open against
//! a file at a time; callers serialise access.

mod restore;

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::{debug, info, warn};

pub use restore::{CapturedRange, RestorePoint, restore};

use crate::catalog::{Catalog, Payload};
use crate::error::{Error, Result};
use crate::hex::HexBytes;
use crate::image::{BinaryImage, ByteStore, Platform};
use crate::inject::{self, InjectedFunctionBody};
use crate::resolver::{ResolutionReport, ResolvedOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum TransactionStatus {
    Pending,
    Validated,
    Applied,
    RolledBack,
    Failed,
}

/// What validation found at a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum SiteState {
    Original,
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchEntry {
    pub target_id: String,
    pub platform: Platform,
    pub offset: usize,
    pub expected: HexBytes,
    pub new_bytes: HexBytes,
    /// Bytes read during validation.
    pub observed: Option<HexBytes>,
    pub state: Option<SiteState>,
}

impl PatchEntry {
    /// Bytes read during validation and touched by the write.
    pub fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.expected.len().max(self.new_bytes.len())
    }

    fn needs_write(&self) -> bool {
        self.state == Some(SiteState::Original)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatchTransaction {
    catalog_version: String,
    platforms: Vec<Platform>,
    entries: Vec<PatchEntry>,
    status: TransactionStatus,
    #[serde(skip)]
    captured: Vec<CapturedRange>,
    #[serde(skip)]
    file_len: usize,
    #[serde(skip)]
    committed_at: Option<DateTime<Utc>>,
}

impl PatchTransaction {
    /// Pair every resolved offset with its payload.
    ///
    /// Refuses incomplete reports, slots without a usable body and entries
    /// whose spans overlap. No transaction exists after a refusal.
    pub fn build(
        report: &ResolutionReport,
        catalog: &Catalog,
        bodies: &[InjectedFunctionBody],
    ) -> Result<Self> {
        Self::build_all(std::slice::from_ref(report), catalog, bodies)
    }

    /// One transaction over the reports of several slices.
    pub fn build_all(
        reports: &[ResolutionReport],
        catalog: &Catalog,
        bodies: &[InjectedFunctionBody],
    ) -> Result<Self> {
        let unresolved: Vec<_> = reports
            .iter()
            .flat_map(|report| report.unresolved().cloned())
            .collect();
        if !unresolved.is_empty() {
            return Err(Error::UnresolvedTargets(unresolved));
        }

        let mut entries = Vec::new();
        for report in reports {
            for resolved in report.resolved() {
                entries.push(build_entry(report, resolved, catalog, bodies)?);
            }
        }

        for body in bodies {
            let used = entries
                .iter()
                .any(|entry| body.fits(&entry.target_id, entry.platform));
            if !used {
                warn!("Ignoring body for {}: no such injection target", body.target_id);
            }
        }

        check_overlaps(&entries)?;
        debug!("Built transaction with {} entries", entries.len());

        Ok(Self {
            catalog_version: catalog.version.clone(),
            platforms: reports.iter().map(|report| report.platform).collect(),
            entries,
            status: TransactionStatus::Pending,
            captured: Vec::new(),
            file_len: 0,
            committed_at: None,
        })
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    /// Pre-patch bytes of every site written by the last commit.
    pub fn captured(&self) -> &[CapturedRange] {
        &self.captured
    }

    /// Whether validation found every site already patched.
    pub fn is_noop(&self) -> bool {
        self.entries.iter().all(|entry| entry.state == Some(SiteState::AlreadyApplied))
    }

    /// Check every site against its expected bytes without writing.
    ///
    /// Every failing site is reported, not just the first.
    pub fn validate<S: ByteStore>(&mut self, image: &BinaryImage<S>) -> Result<()> {
        if !matches!(
            self.status,
            TransactionStatus::Pending | TransactionStatus::Validated
        ) {
            return Err(self.invalid_state(TransactionStatus::Pending));
        }
        if let Some(missing) = self
            .platforms
            .iter()
            .find(|platform| image.slice(**platform).is_none())
        {
            self.status = TransactionStatus::Failed;
            return Err(Error::Format(format!(
                "transaction built for {}, image has no such slice",
                missing
            )));
        }

        let mut failures = Vec::new();
        for entry in &mut self.entries {
            entry.observed = None;
            entry.state = None;

            let span = entry.span();
            let observed = match image.read(span.start, span.len()) {
                Ok(observed) => observed,
                Err(e) => {
                    failures.push(e);
                    continue;
                }
            };
            entry.observed = Some(HexBytes::from(observed));

            let state = if observed.starts_with(&entry.new_bytes) {
                SiteState::AlreadyApplied
            } else if observed.starts_with(&entry.expected) {
                SiteState::Original
            } else {
                failures.push(Error::ValidationMismatch {
                    target: entry.target_id.clone(),
                    offset: entry.offset,
                    expected: entry.expected.clone(),
                    actual: HexBytes::from(&observed[..entry.expected.len()]),
                });
                continue;
            };
            debug!("  {} at 0x{:X}: {}", entry.target_id, entry.offset, state);
            entry.state = Some(state);
        }

        if !failures.is_empty() {
            self.status = TransactionStatus::Failed;
            for failure in &failures {
                warn!("Validation failed: {}", failure);
            }
            return Err(Error::TransactionRejected(failures));
        }

        self.file_len = image.len();
        self.status = TransactionStatus::Validated;
        Ok(())
    }

    /// Stage every write and flush once.
    ///
    /// A flush failure restores the in-memory buffer from the captured
    /// ranges, so the image matches storage again.
    pub fn commit<S: ByteStore>(&mut self, image: &mut BinaryImage<S>) -> Result<()> {
        self.require(TransactionStatus::Validated)?;
        if image.len() != self.file_len {
            self.status = TransactionStatus::Failed;
            return Err(Error::RestoreMismatch(format!(
                "image changed size since validation ({} -> {} bytes)",
                self.file_len,
                image.len()
            )));
        }

        let mut captured = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.needs_write()) {
            let bytes = image.read(entry.offset, entry.new_bytes.len())?;
            captured.push(CapturedRange {
                offset: entry.offset,
                bytes: HexBytes::from(bytes),
            });
        }

        if captured.is_empty() {
            info!("All {} sites already patched, nothing to write", self.entries.len());
            self.captured = captured;
            self.committed_at = Some(Utc::now());
            self.status = TransactionStatus::Applied;
            return Ok(());
        }

        let staged = self
            .entries
            .iter()
            .filter(|entry| entry.needs_write())
            .try_for_each(|entry| image.write(entry.offset, &entry.new_bytes));

        if let Err(e) = staged.and_then(|()| image.flush()) {
            warn!("Commit failed, restoring staged buffer: {}", e);
            restore::write_ranges(image, &captured)?;
            self.status = TransactionStatus::Failed;
            return Err(e);
        }

        info!("Committed {} patch site(s)", captured.len());
        self.captured = captured;
        self.committed_at = Some(Utc::now());
        self.status = TransactionStatus::Applied;
        Ok(())
    }

    /// Write the captured pre-patch bytes back and flush.
    pub fn rollback<S: ByteStore>(&mut self, image: &mut BinaryImage<S>) -> Result<()> {
        self.require(TransactionStatus::Applied)?;

        if !self.captured.is_empty() {
            let written = restore::write_ranges(image, &self.captured).and_then(|()| image.flush());
            if let Err(e) = written {
                self.status = TransactionStatus::Failed;
                return Err(e);
            }
        }

        info!("Rolled back {} patch site(s)", self.captured.len());
        self.status = TransactionStatus::RolledBack;
        Ok(())
    }

    /// Restore point for the last commit.
    pub fn restore_point(&self) -> Option<RestorePoint> {
        if self.status != TransactionStatus::Applied {
            return None;
        }
        Some(RestorePoint {
            catalog_version: self.catalog_version.clone(),
            platforms: self.platforms.clone(),
            file_len: self.file_len,
            captured_at: self.committed_at?,
            ranges: self.captured.clone(),
        })
    }

    fn require(&self, expected: TransactionStatus) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected))
        }
    }

    fn invalid_state(&self, expected: TransactionStatus) -> Error {
        Error::InvalidState {
            expected: expected.to_string(),
            actual: self.status.to_string(),
        }
    }
}

fn build_entry(
    report: &ResolutionReport,
    resolved: &ResolvedOffset,
    catalog: &Catalog,
    bodies: &[InjectedFunctionBody],
) -> Result<PatchEntry> {
    let platform = report.platform;
    let target = catalog
        .target(&resolved.target_id)
        .ok_or_else(|| Error::Catalog(format!("{} is not in the catalog", resolved.target_id)))?;
    let variant = target
        .variant(platform)
        .ok_or_else(|| Error::Catalog(format!("{} has no {} variant", target.id, platform)))?;

    let new_bytes = match &variant.payload {
        Payload::Bytes { bytes } => bytes.clone(),
        Payload::InjectedBody { slot_len } => {
            let body = bodies
                .iter()
                .find(|body| body.fits(&target.id, platform))
                .ok_or_else(|| Error::MissingInjectedBody(target.id.clone()))?;
            HexBytes::new(inject::splice_into(body, *slot_len, platform.arch())?)
        }
    };

    Ok(PatchEntry {
        target_id: target.id.clone(),
        platform,
        offset: resolved.offset,
        expected: variant.expected.clone(),
        new_bytes,
        observed: None,
        state: None,
    })
}

fn check_overlaps(entries: &[PatchEntry]) -> Result<()> {
    let mut spans: Vec<(Range<usize>, &str)> = entries
        .iter()
        .map(|entry| (entry.span(), entry.target_id.as_str()))
        .collect();
    spans.sort_by_key(|(span, _)| span.start);

    for pair in spans.windows(2) {
        let (first, first_id) = &pair[0];
        let (second, second_id) = &pair[1];
        if first.end > second.start {
            return Err(Error::OverlappingTargets {
                first: first_id.to_string(),
                second: second_id.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{fixed, rule, target};
    use crate::catalog::{PatchTarget, TargetVariant};
    use crate::config::ResolverConfig;
    use crate::image::fixtures::{
        elf_image, memory_image, pe_image, put, universal_image_with_arm64,
    };
    use crate::image::MemoryStore;
    use crate::resolver::{OffsetResolver, ResolutionMethod, ResolvedOffset, TargetResolution};
    use crate::signature::Signature;

    const LINUX: Platform = Platform::Linux;

    fn slot_variant(slot_len: usize) -> TargetVariant {
        TargetVariant {
            expected: HexBytes::from(&[0x55, 0x48][..]),
            signature: Some(Signature::new("F1 F2 F3 F4", 4)),
            payload: Payload::InjectedBody { slot_len },
            last_known_va: None,
        }
    }

    fn catalog_with(targets: Vec<PatchTarget>) -> Catalog {
        let catalog = Catalog {
            version: "test".to_string(),
            targets,
            derivations: vec![rule(LINUX, "A", "B", 16)],
        };
        catalog.validate().unwrap();
        catalog
    }

    fn stereo_catalog() -> Catalog {
        catalog_with(vec![
            target("A", LINUX, fixed(&[0x10], Some(("?? 5A A5 C3 7E", 0)), &[0x11])),
            target("B", LINUX, fixed(&[0x20, 0x21], None, &[0x22, 0x23])),
            target("C", LINUX, fixed(&[0x30], Some(("?? 3C 3D 3E", 0)), &[0x31])),
        ])
    }

    fn original_bytes() -> Vec<u8> {
        let mut bytes = elf_image(0x1000);
        put(&mut bytes, 100, &[0x10, 0x5A, 0xA5, 0xC3, 0x7E]);
        put(&mut bytes, 116, &[0x20, 0x21]);
        put(&mut bytes, 200, &[0x30, 0x3C, 0x3D, 0x3E]);
        bytes
    }

    fn report_for(image: &BinaryImage<MemoryStore>, catalog: &Catalog) -> ResolutionReport {
        let config = ResolverConfig::default();
        OffsetResolver::new(image, catalog, &config).resolve().unwrap()
    }

    fn manual_report(offsets: &[(&str, usize)]) -> ResolutionReport {
        ResolutionReport {
            catalog_version: "test".to_string(),
            platform: LINUX,
            format: crate::image::ContainerFormat::Elf,
            targets: offsets
                .iter()
                .map(|(id, offset)| {
                    TargetResolution::Resolved(ResolvedOffset {
                        target_id: id.to_string(),
                        offset: *offset,
                        method: ResolutionMethod::DirectSignature,
                        source: None,
                        va: None,
                    })
                })
                .collect(),
        }
    }

    fn apply(image: &mut BinaryImage<MemoryStore>, catalog: &Catalog) -> PatchTransaction {
        let report = report_for(image, catalog);
        let mut transaction = PatchTransaction::build(&report, catalog, &[]).unwrap();
        transaction.validate(image).unwrap();
        transaction.commit(image).unwrap();
        transaction
    }

    #[test]
    fn test_commit_writes_every_site_with_one_flush() {
        let catalog = stereo_catalog();
        let mut image = memory_image(original_bytes());

        let transaction = apply(&mut image, &catalog);
        assert_eq!(transaction.status(), TransactionStatus::Applied);
        assert!(
            transaction
                .entries()
                .iter()
                .all(|e| e.state == Some(SiteState::Original))
        );
        assert_eq!(image.store().persist_count(), 1);

        let stored = image.store().bytes();
        assert_eq!(stored[100], 0x11);
        assert_eq!(&stored[116..118], &[0x22, 0x23]);
        assert_eq!(stored[200], 0x31);
        assert_eq!(transaction.captured().len(), 3);
    }

    #[test]
    fn test_second_run_is_a_noop() {
        let catalog = stereo_catalog();
        let mut image = memory_image(original_bytes());
        apply(&mut image, &catalog);
        let after_first = image.store().bytes().to_vec();

        let second = apply(&mut image, &catalog);
        assert!(second.is_noop());
        assert!(second.captured().is_empty());
        assert_eq!(second.status(), TransactionStatus::Applied);
        assert_eq!(image.store().persist_count(), 1);
        assert_eq!(image.store().bytes(), &after_first[..]);
    }

    #[test]
    fn test_any_mismatch_rejects_without_writing() {
        let catalog = stereo_catalog();
        let mut bytes = original_bytes();
        bytes[100] = 0x77;
        bytes[200] = 0x78;
        let mut image = memory_image(bytes.clone());

        let report = report_for(&image, &catalog);
        let mut transaction = PatchTransaction::build(&report, &catalog, &[]).unwrap();
        let err = transaction.validate(&image).unwrap_err();

        let failures = err.failures();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| matches!(f, Error::ValidationMismatch { .. })));
        assert_eq!(transaction.status(), TransactionStatus::Failed);

        assert!(matches!(
            transaction.commit(&mut image),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(image.bytes(), &bytes[..]);
        assert_eq!(image.store().persist_count(), 0);
    }

    #[test]
    fn test_flush_failure_restores_buffer() {
        let catalog = stereo_catalog();
        let bytes = original_bytes();
        let mut image = memory_image(bytes.clone());

        let report = report_for(&image, &catalog);
        let mut transaction = PatchTransaction::build(&report, &catalog, &[]).unwrap();
        transaction.validate(&image).unwrap();
        image.store_mut().set_fail_persist(true);

        assert!(matches!(transaction.commit(&mut image), Err(Error::Io(_))));
        assert_eq!(transaction.status(), TransactionStatus::Failed);
        assert_eq!(image.bytes(), &bytes[..]);
        assert_eq!(image.store().bytes(), &bytes[..]);
        assert!(transaction.restore_point().is_none());
    }

    #[test]
    fn test_rollback_and_restore_point() {
        let catalog = stereo_catalog();
        let bytes = original_bytes();
        let mut image = memory_image(bytes.clone());

        let mut transaction = apply(&mut image, &catalog);
        let point = transaction.restore_point().unwrap();
        assert_eq!(point.file_len, bytes.len());
        assert_eq!(point.ranges.len(), 3);

        transaction.rollback(&mut image).unwrap();
        assert_eq!(transaction.status(), TransactionStatus::RolledBack);
        assert_eq!(image.store().bytes(), &bytes[..]);
        assert!(matches!(
            transaction.rollback(&mut image),
            Err(Error::InvalidState { .. })
        ));

        // The restore point undoes a fresh commit just as well.
        apply(&mut image, &catalog);
        restore(&mut image, &point).unwrap();
        assert_eq!(image.store().bytes(), &bytes[..]);
    }

    #[test]
    fn test_validate_on_foreign_platform_fails_the_transaction() {
        let catalog = stereo_catalog();
        let report = report_for(&memory_image(original_bytes()), &catalog);
        let mut transaction = PatchTransaction::build(&report, &catalog, &[]).unwrap();

        let mut windows = memory_image(pe_image(0x1000, 0x1_8000_0000));
        assert!(matches!(transaction.validate(&windows), Err(Error::Format(_))));
        assert_eq!(transaction.status(), TransactionStatus::Failed);
        assert!(matches!(
            transaction.commit(&mut windows),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(windows.store().persist_count(), 0);
    }

    #[test]
    fn test_both_slices_commit_together() {
        let x86 = fixed(&[0x10], Some(("?? 5A A5 C3 7E", 0)), &[0x11]);
        let arm = fixed(
            &[0x1F, 0x20, 0x03, 0xD5],
            Some(("?? ?? ?? ?? C0 03 5F D6", 0)),
            &[0x20, 0x00, 0x80, 0x52],
        );
        let mut a = target("A", Platform::MacOs, x86);
        a.variants.insert(Platform::MacOsArm64, arm);
        let catalog = Catalog {
            version: "test".to_string(),
            targets: vec![a],
            derivations: vec![],
        };
        catalog.validate().unwrap();

        let mut bytes = universal_image_with_arm64(0x1000, 0x6000, 0x1000, 0x7000);
        put(&mut bytes, 0x4100, &[0x10, 0x5A, 0xA5, 0xC3, 0x7E]);
        put(&mut bytes, 0x6200, &[0x1F, 0x20, 0x03, 0xD5, 0xC0, 0x03, 0x5F, 0xD6]);
        let mut image = memory_image(bytes);

        let config = ResolverConfig::default();
        let reports: Vec<ResolutionReport> = image
            .slices()
            .iter()
            .map(|slice| {
                OffsetResolver::for_slice(&image, slice, &catalog, &config)
                    .resolve()
                    .unwrap()
            })
            .collect();
        let mut transaction = PatchTransaction::build_all(&reports, &catalog, &[]).unwrap();
        assert_eq!(transaction.entries().len(), 2);
        transaction.validate(&image).unwrap();
        transaction.commit(&mut image).unwrap();

        assert_eq!(image.store().persist_count(), 1);
        let stored = image.store().bytes();
        assert_eq!(stored[0x4100], 0x11);
        assert_eq!(&stored[0x6200..0x6204], &[0x20, 0x00, 0x80, 0x52]);

        let point = transaction.restore_point().unwrap();
        assert_eq!(point.platforms, vec![Platform::MacOs, Platform::MacOsArm64]);
    }

    #[test]
    fn test_rollback_requires_applied() {
        let catalog = stereo_catalog();
        let mut image = memory_image(original_bytes());
        let report = report_for(&image, &catalog);
        let mut transaction = PatchTransaction::build(&report, &catalog, &[]).unwrap();
        assert!(matches!(
            transaction.rollback(&mut image),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            transaction.commit(&mut image),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_build_refuses_unresolved_report() {
        let catalog = stereo_catalog();
        let mut bytes = original_bytes();
        bytes[201] = 0x00;
        let image = memory_image(bytes);

        let report = report_for(&image, &catalog);
        assert!(matches!(
            PatchTransaction::build(&report, &catalog, &[]),
            Err(Error::UnresolvedTargets(ref targets)) if targets.len() == 1
        ));
    }

    #[test]
    fn test_build_refuses_overlapping_spans() {
        let catalog = catalog_with(vec![
            target("A", LINUX, fixed(&[0x10, 0x11], None, &[0x90, 0x90])),
            target("B", LINUX, fixed(&[0x20], None, &[0x90])),
        ]);
        let report = manual_report(&[("A", 100), ("B", 101)]);
        assert!(matches!(
            PatchTransaction::build(&report, &catalog, &[]),
            Err(Error::OverlappingTargets { .. })
        ));

        let report = manual_report(&[("A", 100), ("B", 102)]);
        assert!(PatchTransaction::build(&report, &catalog, &[]).is_ok());
    }

    #[test]
    fn test_build_checks_injected_bodies() {
        let catalog = Catalog {
            version: "test".to_string(),
            targets: vec![target("Slot", LINUX, slot_variant(0x20))],
            derivations: vec![],
        };
        let report = manual_report(&[("Slot", 0x204)]);

        assert!(matches!(
            PatchTransaction::build(&report, &catalog, &[]),
            Err(Error::MissingInjectedBody(ref id)) if id == "Slot"
        ));

        let oversize = InjectedFunctionBody::new("Slot", vec![0x90; 0x21], 0x190);
        assert!(matches!(
            PatchTransaction::build(&report, &catalog, &[oversize]),
            Err(Error::InjectionOverflow { length: 0x21, max_length: 0x20, .. })
        ));
    }

    #[test]
    fn test_injected_body_is_spliced_into_slot() {
        let catalog = Catalog {
            version: "test".to_string(),
            targets: vec![target("Slot", LINUX, slot_variant(0x20))],
            derivations: vec![],
        };
        let mut bytes = elf_image(0x1000);
        put(&mut bytes, 0x200, &[0xF1, 0xF2, 0xF3, 0xF4, 0x55, 0x48, 0x89, 0xE5]);
        let mut image = memory_image(bytes);

        let body = InjectedFunctionBody::new("Slot", vec![0x31, 0xC0, 0xC3], 0x20);
        let report = report_for(&image, &catalog);
        let mut transaction = PatchTransaction::build(&report, &catalog, &[body.clone()]).unwrap();
        transaction.validate(&image).unwrap();
        transaction.commit(&mut image).unwrap();

        let slot = image.read(0x204, 0x20).unwrap();
        assert_eq!(&slot[..3], &[0x31, 0xC0, 0xC3]);
        assert!(slot[3..].iter().all(|b| *b == 0x90));

        // Signature sits before the slot, so the spliced site still resolves.
        let report = report_for(&image, &catalog);
        let mut again = PatchTransaction::build(&report, &catalog, &[body]).unwrap();
        again.validate(&image).unwrap();
        assert!(again.is_noop());
    }

    #[test]
    fn test_commit_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.node");
        std::fs::write(&path, original_bytes()).unwrap();

        let catalog = stereo_catalog();
        let mut image = BinaryImage::open(&path).unwrap();
        let config = ResolverConfig::default();
        let report = OffsetResolver::new(&image, &catalog, &config).resolve().unwrap();
        let mut transaction = PatchTransaction::build(&report, &catalog, &[]).unwrap();
        transaction.validate(&image).unwrap();
        transaction.commit(&mut image).unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk[100], 0x11);
        assert_eq!(on_disk.len(), 0x1000);
    }
}
