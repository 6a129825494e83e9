//! Read-only inspection of patch sites.

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::catalog::{Catalog, Payload};
use crate::hex::HexBytes;
use crate::image::{BinaryImage, ByteStore, Platform};
use crate::inject;
use crate::resolver::{ResolutionReport, TargetResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum SiteStatus {
    Original,
    Patched,
    /// Neither the expected nor the patch bytes.
    Foreign,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum PatchStatus {
    Unpatched,
    Patched,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub target_id: String,
    pub offset: Option<usize>,
    pub status: SiteStatus,
    pub observed: Option<HexBytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub catalog_version: String,
    pub platform: Platform,
    pub overall: PatchStatus,
    pub targets: Vec<TargetStatus>,
}

impl StatusReport {
    pub fn count(&self, status: SiteStatus) -> usize {
        self.targets.iter().filter(|t| t.status == status).count()
    }
}

/// Classify every target of `report` without touching the image.
pub fn inspect<S: ByteStore>(
    image: &BinaryImage<S>,
    report: &ResolutionReport,
    catalog: &Catalog,
) -> StatusReport {
    let targets: Vec<TargetStatus> = report
        .targets
        .iter()
        .map(|resolution| classify(image, resolution, catalog, report.platform))
        .collect();

    let overall = if !targets.is_empty() && targets.iter().all(|t| t.status == SiteStatus::Patched)
    {
        PatchStatus::Patched
    } else if targets.iter().all(|t| t.status == SiteStatus::Original) {
        PatchStatus::Unpatched
    } else {
        PatchStatus::Partial
    };

    StatusReport {
        catalog_version: report.catalog_version.clone(),
        platform: report.platform,
        overall,
        targets,
    }
}

fn classify<S: ByteStore>(
    image: &BinaryImage<S>,
    resolution: &TargetResolution,
    catalog: &Catalog,
    platform: Platform,
) -> TargetStatus {
    let unresolved = |offset| TargetStatus {
        target_id: resolution.target_id().to_string(),
        offset,
        status: SiteStatus::Unresolved,
        observed: None,
    };

    let Some(resolved) = resolution.as_resolved() else {
        return unresolved(None);
    };
    let Some(variant) = catalog
        .target(&resolved.target_id)
        .and_then(|target| target.variant(platform))
    else {
        return unresolved(Some(resolved.offset));
    };
    let Ok(observed) = image.read(resolved.offset, variant.site_len()) else {
        return unresolved(Some(resolved.offset));
    };

    let status = match &variant.payload {
        _ if variant.holds_patch(observed, 0) => SiteStatus::Patched,
        _ if variant.holds_expected(observed, 0) => SiteStatus::Original,
        Payload::InjectedBody { .. } if inject::is_padded(observed, platform.arch()) => {
            SiteStatus::Patched
        }
        _ => SiteStatus::Foreign,
    };

    TargetStatus {
        target_id: resolved.target_id.clone(),
        offset: Some(resolved.offset),
        status,
        observed: Some(HexBytes::from(observed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{fixed, target};
    use crate::catalog::{PatchTarget, TargetVariant};
    use crate::config::ResolverConfig;
    use crate::image::fixtures::{elf_image, memory_image, put};
    use crate::resolver::OffsetResolver;
    use crate::signature::Signature;

    const LINUX: Platform = Platform::Linux;

    fn catalog() -> Catalog {
        let slot = TargetVariant {
            expected: HexBytes::from(&[0x55, 0x48][..]),
            signature: Some(Signature::new("F1 F2 F3 F4", 4)),
            payload: Payload::InjectedBody { slot_len: 8 },
            last_known_va: None,
        };
        let targets: Vec<PatchTarget> = vec![
            target("A", LINUX, fixed(&[0x10], Some(("?? 5A A5 C3 7E", 0)), &[0x11])),
            target("Slot", LINUX, slot),
        ];
        Catalog {
            version: "test".to_string(),
            targets,
            derivations: vec![],
        }
    }

    fn status_of(bytes: Vec<u8>) -> StatusReport {
        let catalog = catalog();
        let image = memory_image(bytes);
        let config = ResolverConfig::default();
        let report = OffsetResolver::new(&image, &catalog, &config).resolve().unwrap();
        inspect(&image, &report, &catalog)
    }

    fn base() -> Vec<u8> {
        let mut bytes = elf_image(0x1000);
        put(&mut bytes, 100, &[0x10, 0x5A, 0xA5, 0xC3, 0x7E]);
        put(&mut bytes, 0x200, &[0xF1, 0xF2, 0xF3, 0xF4, 0x55, 0x48, 0x89, 0xE5]);
        bytes
    }

    #[test]
    fn test_unpatched_image() {
        let status = status_of(base());
        assert_eq!(status.overall, PatchStatus::Unpatched);
        assert_eq!(status.count(SiteStatus::Original), 2);
        assert_eq!(status.overall.to_string(), "UNPATCHED");
    }

    #[test]
    fn test_patched_image() {
        let mut bytes = base();
        bytes[100] = 0x11;
        put(&mut bytes, 0x204, &[0x31, 0xC0, 0xC3, 0x90, 0x90, 0x90, 0x90, 0x90]);
        let status = status_of(bytes);
        assert_eq!(status.overall, PatchStatus::Patched);
    }

    #[test]
    fn test_partial_and_foreign() {
        let mut bytes = base();
        bytes[100] = 0x11;
        put(&mut bytes, 0x204, &[0x31, 0xC0, 0xC3, 0x90]);
        let status = status_of(bytes);
        assert_eq!(status.overall, PatchStatus::Partial);
        assert_eq!(status.targets[1].status, SiteStatus::Foreign);
    }

    #[test]
    fn test_unresolved_target_makes_partial() {
        let mut bytes = base();
        bytes[101] = 0x00;
        let status = status_of(bytes);
        assert_eq!(status.targets[0].status, SiteStatus::Unresolved);
        assert_eq!(status.overall, PatchStatus::Partial);
    }
}
