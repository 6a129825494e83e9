//! Splicing of externally compiled function bodies into fixed-size slots.
//!
//! Bodies are raw machine code produced outside this crate. A body is never
//! truncated: anything longer than its slot is a hard failure raised before
//! any byte is written.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::image::{Arch, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedFunctionBody {
    pub target_id: String,
    pub code: Vec<u8>,
    pub max_length: usize,
    /// Slice the body was compiled for; `None` fits every slice declaring
    /// the target.
    pub platform: Option<Platform>,
}

impl InjectedFunctionBody {
    pub fn new(target_id: impl Into<String>, code: Vec<u8>, max_length: usize) -> Self {
        Self {
            target_id: target_id.into(),
            code,
            max_length,
            platform: None,
        }
    }

    pub fn for_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Whether this body is meant for `target_id` on `platform`.
    pub fn fits(&self, target_id: &str, platform: Platform) -> bool {
        self.target_id == target_id && self.platform.is_none_or(|p| p == platform)
    }

    /// Load a raw body from disk.
    pub fn from_file<P: AsRef<Path>>(
        target_id: impl Into<String>,
        path: P,
        max_length: usize,
    ) -> Result<Self> {
        let code = fs::read(&path)?;
        debug!(
            "Loaded {} byte body from {}",
            code.len(),
            path.as_ref().display()
        );
        Ok(Self::new(target_id, code, max_length))
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// Body padded to its own `max_length` with NOPs of its platform (x86_64
/// when unset).
pub fn splice(body: &InjectedFunctionBody) -> Result<Vec<u8>> {
    let arch = body.platform.map_or(Arch::X86_64, |platform| platform.arch());
    splice_into(body, body.max_length, arch)
}

/// Body padded to `slot_len` with `arch` NOPs. The body must fit both its
/// own limit and the slot.
pub fn splice_into(body: &InjectedFunctionBody, slot_len: usize, arch: Arch) -> Result<Vec<u8>> {
    if body.is_empty() {
        return Err(Error::EmptyInjectedBody(body.target_id.clone()));
    }

    let limit = body.max_length.min(slot_len);
    if body.len() > limit {
        return Err(Error::InjectionOverflow {
            target: body.target_id.clone(),
            length: body.len(),
            max_length: limit,
        });
    }

    let mut spliced = body.code.clone();
    spliced.extend((body.len()..slot_len).map(|i| padding_at(arch, i)));
    Ok(spliced)
}

/// Padding byte at slot position `i`. NOP encodings are laid out from the
/// slot start so wide instructions stay aligned.
fn padding_at(arch: Arch, i: usize) -> u8 {
    let nop = arch.nop();
    nop[i % nop.len()]
}

/// Whether a slot's tail carries splice padding.
pub fn is_padded(slot: &[u8], arch: Arch) -> bool {
    slot.len()
        .checked_sub(1)
        .is_some_and(|last| slot[last] == padding_at(arch, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_splice_pads_with_nop() {
        let body = InjectedFunctionBody::new("HighpassCutoffFilter", vec![0x31, 0xC0, 0xC3], 8);
        let spliced = splice(&body).unwrap();
        assert_eq!(spliced, vec![0x31, 0xC0, 0xC3, 0x90, 0x90, 0x90, 0x90, 0x90]);
        assert!(is_padded(&spliced, Arch::X86_64));
    }

    #[test]
    fn test_arm64_padding_keeps_nop_alignment() {
        let ret = vec![0xC0, 0x03, 0x5F, 0xD6];
        let body = InjectedFunctionBody::new("HighpassCutoffFilter", ret, 12)
            .for_platform(Platform::MacOsArm64);
        let spliced = splice(&body).unwrap();
        assert_eq!(
            spliced,
            vec![
                0xC0, 0x03, 0x5F, 0xD6, 0x1F, 0x20, 0x03, 0xD5, 0x1F, 0x20, 0x03, 0xD5
            ]
        );
        assert!(is_padded(&spliced, Arch::Arm64));
        assert!(!is_padded(&spliced, Arch::X86_64));
    }

    #[test]
    fn test_exact_fit_has_no_padding() {
        let body = InjectedFunctionBody::new("DcReject", vec![0xC3; 400], 400);
        let spliced = splice(&body).unwrap();
        assert_eq!(spliced.len(), 400);
        assert!(!is_padded(&spliced, Arch::X86_64));
        assert!(!is_padded(&[], Arch::X86_64));
    }

    #[test]
    fn test_body_platform_filter() {
        let any = InjectedFunctionBody::new("DcReject", vec![0xC3], 16);
        assert!(any.fits("DcReject", Platform::MacOsArm64));
        assert!(!any.fits("HighpassCutoffFilter", Platform::MacOs));

        let arm = any.for_platform(Platform::MacOsArm64);
        assert!(arm.fits("DcReject", Platform::MacOsArm64));
        assert!(!arm.fits("DcReject", Platform::MacOs));
    }

    #[test]
    fn test_overflow_by_one_byte() {
        let body = InjectedFunctionBody::new("DcReject", vec![0x90; 401], 400);
        match splice(&body) {
            Err(Error::InjectionOverflow {
                target,
                length,
                max_length,
            }) => {
                assert_eq!(target, "DcReject");
                assert_eq!(length, 401);
                assert_eq!(max_length, 400);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slot_smaller_than_body_limit() {
        let body = InjectedFunctionBody::new("DcReject", vec![0x90; 20], 400);
        assert!(matches!(
            splice_into(&body, 16, Arch::X86_64),
            Err(Error::InjectionOverflow { max_length: 16, .. })
        ));
        assert_eq!(splice_into(&body, 24, Arch::X86_64).unwrap().len(), 24);
    }

    #[test]
    fn test_empty_body_rejected() {
        let body = InjectedFunctionBody::new("DcReject", Vec::new(), 400);
        assert!(matches!(splice(&body), Err(Error::EmptyInjectedBody(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x55, 0x48, 0x89, 0xE5, 0xC3]).unwrap();
        let body = InjectedFunctionBody::from_file("HighpassCutoffFilter", file.path(), 0x190).unwrap();
        assert_eq!(body.len(), 5);
        assert_eq!(body.max_length, 0x190);
    }
}
