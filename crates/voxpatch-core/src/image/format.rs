//! Container detection and address translation.

use std::ops::Range;

use goblin::Hint;
use goblin::elf::header::ET_DYN;
use goblin::mach::MultiArch;
use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86_64};
use goblin::mach::header::{MH_BUNDLE, MH_DYLIB};
use goblin::pe::header::{PE_MAGIC, PE_POINTER_OFFSET, SIZEOF_COFF_HEADER};
use goblin::pe::optional_header::{MAGIC_32, MAGIC_64};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use super::layout::{self, HEADER_PEEK_SIZE, MACHO_X86_64_SLICE_OFFSET, PE_TEXT_ADJUSTMENT};
use crate::error::{Error, Result};

/// Platform variant a catalog entry is written for. Universal Mach-O images
/// carry one slice per macOS variant.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    #[serde(rename = "macos")]
    #[strum(serialize = "macos")]
    MacOs,
    #[serde(rename = "macos-arm64")]
    #[strum(serialize = "macos-arm64")]
    MacOsArm64,
}

impl Platform {
    pub fn arch(&self) -> Arch {
        match self {
            Self::Windows | Self::Linux | Self::MacOs => Arch::X86_64,
            Self::MacOsArm64 => Arch::Arm64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Arch {
    #[serde(rename = "x86_64")]
    #[strum(serialize = "x86_64")]
    X86_64,
    Arm64,
}

impl Arch {
    /// Instruction used to fill unused code bytes.
    pub fn nop(&self) -> &'static [u8] {
        match self {
            Self::X86_64 => &[0x90],
            Self::Arm64 => &[0x1F, 0x20, 0x03, 0xD5],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ContainerFormat {
    #[strum(serialize = "PE")]
    Pe,
    #[strum(serialize = "ELF")]
    Elf,
    #[strum(serialize = "Mach-O")]
    MachO,
    #[strum(serialize = "Mach-O universal")]
    MachOUniversal,
}

/// How a virtual address (relative to the image base) maps to a file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddressTranslation {
    /// file = va - constant
    HeaderAdjusted(u64),
    /// file = va
    Identity,
    /// file = va + slice start (va minus a negative constant)
    SliceRelative(u64),
}

impl AddressTranslation {
    pub fn to_file_offset(self, va: u64) -> Option<u64> {
        match self {
            Self::HeaderAdjusted(adjust) => va.checked_sub(adjust),
            Self::Identity => Some(va),
            Self::SliceRelative(slice) => va.checked_add(slice),
        }
    }

    pub fn to_va(self, file_offset: u64) -> Option<u64> {
        match self {
            Self::HeaderAdjusted(adjust) => file_offset.checked_add(adjust),
            Self::Identity => Some(file_offset),
            Self::SliceRelative(slice) => file_offset.checked_sub(slice),
        }
    }
}

/// Code of one architecture inside the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub platform: Platform,
    pub translation: AddressTranslation,
    /// File range scanned for signatures.
    pub scan_range: Range<usize>,
}

impl Slice {
    fn whole(platform: Platform, translation: AddressTranslation, len: usize) -> Self {
        Self {
            platform,
            translation,
            scan_range: 0..len,
        }
    }

    /// File offset of `va`, if it lands inside the slice.
    pub fn to_file_offset(&self, va: u64) -> Option<usize> {
        self.translation
            .to_file_offset(va)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|offset| self.scan_range.contains(offset))
    }

    pub fn to_va(&self, file_offset: usize) -> Option<u64> {
        self.translation.to_va(file_offset as u64)
    }

    /// Whether `length` bytes at `offset` lie inside the slice.
    pub fn contains(&self, offset: usize, length: usize) -> bool {
        offset >= self.scan_range.start
            && offset
                .checked_add(length)
                .is_some_and(|end| end <= self.scan_range.end)
    }
}

/// Result of header inspection. `slices` is never empty; the first entry is
/// the primary slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfo {
    pub format: ContainerFormat,
    pub image_base: u64,
    pub slices: Vec<Slice>,
}

pub fn detect(bytes: &[u8]) -> Result<FormatInfo> {
    let head: [u8; HEADER_PEEK_SIZE] = bytes
        .get(..HEADER_PEEK_SIZE)
        .and_then(|head| head.try_into().ok())
        .ok_or_else(|| {
            Error::Format(format!(
                "file is {} bytes, header needs {}",
                bytes.len(),
                HEADER_PEEK_SIZE
            ))
        })?;

    let hint = goblin::peek_bytes(&head).map_err(|e| Error::Format(e.to_string()))?;
    debug!("Container hint: {:?}", hint);

    match hint {
        Hint::PE => detect_pe(bytes),
        Hint::Elf(data) => detect_elf(bytes, data.is_lsb),
        Hint::Mach(data) => {
            let platform = check_macho_header(bytes, 0, data.is_lsb)?;
            Ok(FormatInfo {
                format: ContainerFormat::MachO,
                image_base: 0,
                slices: vec![Slice::whole(
                    platform,
                    AddressTranslation::Identity,
                    bytes.len(),
                )],
            })
        }
        Hint::MachFat(_) => detect_universal(bytes),
        other => Err(Error::Format(format!("unsupported container {:?}", other))),
    }
}

fn detect_pe(bytes: &[u8]) -> Result<FormatInfo> {
    let pe_offset = read_u32(bytes, PE_POINTER_OFFSET as usize, true)? as usize;
    let signature = read_u32(bytes, pe_offset, true)?;
    if signature != PE_MAGIC {
        return Err(Error::Format(format!(
            "missing PE signature at {:#x}",
            pe_offset
        )));
    }

    let optional = pe_offset + 4 + SIZEOF_COFF_HEADER;
    let image_base = match read_u16(bytes, optional, true)? {
        MAGIC_64 => read_u64(bytes, optional + layout::pe::IMAGE_BASE_PE32_PLUS, true)?,
        MAGIC_32 => read_u32(bytes, optional + layout::pe::IMAGE_BASE_PE32, true)? as u64,
        other => {
            return Err(Error::Format(format!(
                "unknown PE optional header magic {:#x}",
                other
            )));
        }
    };

    Ok(FormatInfo {
        format: ContainerFormat::Pe,
        image_base,
        slices: vec![Slice::whole(
            Platform::Windows,
            AddressTranslation::HeaderAdjusted(PE_TEXT_ADJUSTMENT),
            bytes.len(),
        )],
    })
}

fn detect_elf(bytes: &[u8], is_lsb: bool) -> Result<FormatInfo> {
    let e_type = read_u16(bytes, layout::ELF_TYPE_OFFSET, is_lsb)?;
    if e_type != ET_DYN {
        return Err(Error::Format(format!(
            "ELF type {} is not a position-independent shared object",
            e_type
        )));
    }

    Ok(FormatInfo {
        format: ContainerFormat::Elf,
        image_base: 0,
        slices: vec![Slice::whole(
            Platform::Linux,
            AddressTranslation::Identity,
            bytes.len(),
        )],
    })
}

fn detect_universal(bytes: &[u8]) -> Result<FormatInfo> {
    let multi = MultiArch::new(bytes).map_err(|e| Error::Format(e.to_string()))?;
    let arches = multi.arches().map_err(|e| Error::Format(e.to_string()))?;

    let mut slices = Vec::new();
    // x86_64 first so it stays the primary slice.
    for cputype in [CPU_TYPE_X86_64, CPU_TYPE_ARM64] {
        let Some(arch) = arches.iter().find(|arch| arch.cputype == cputype) else {
            continue;
        };

        let start = arch.offset as usize;
        if cputype == CPU_TYPE_X86_64 && start as u64 != MACHO_X86_64_SLICE_OFFSET {
            return Err(Error::Format(format!(
                "x86_64 slice at {:#x}, expected {:#x}",
                start, MACHO_X86_64_SLICE_OFFSET
            )));
        }

        let end = start
            .checked_add(arch.size as usize)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| {
                Error::Format(format!("{} slice extends past end of file", cpu_name(cputype)))
            })?;

        let is_lsb = match read_u32(bytes, start, true)? {
            goblin::mach::header::MH_MAGIC_64 | goblin::mach::header::MH_MAGIC => true,
            goblin::mach::header::MH_CIGAM_64 | goblin::mach::header::MH_CIGAM => false,
            other => {
                return Err(Error::Format(format!(
                    "{} slice has bad Mach-O magic {:#x}",
                    cpu_name(cputype),
                    other
                )));
            }
        };
        let platform = check_macho_header(bytes, start, is_lsb)?;
        debug!("{} slice at {:#x}..{:#x}", platform, start, end);

        slices.push(Slice {
            platform,
            translation: AddressTranslation::SliceRelative(start as u64),
            scan_range: start..end,
        });
    }

    if slices.is_empty() {
        return Err(Error::Format(
            "universal binary has neither an x86_64 nor an arm64 slice".to_string(),
        ));
    }

    Ok(FormatInfo {
        format: ContainerFormat::MachOUniversal,
        image_base: 0,
        slices,
    })
}

fn cpu_name(cputype: u32) -> &'static str {
    match cputype {
        CPU_TYPE_X86_64 => "x86_64",
        CPU_TYPE_ARM64 => "arm64",
        _ => "unknown",
    }
}

/// Checks cpu and file type, returning the platform of the slice.
fn check_macho_header(bytes: &[u8], base: usize, is_lsb: bool) -> Result<Platform> {
    let cpu_type = read_u32(bytes, base + layout::macho::CPU_TYPE, is_lsb)?;
    let platform = match cpu_type {
        CPU_TYPE_X86_64 => Platform::MacOs,
        CPU_TYPE_ARM64 => Platform::MacOsArm64,
        other => {
            return Err(Error::Format(format!(
                "Mach-O cpu type {:#x} is neither x86_64 nor arm64",
                other
            )));
        }
    };

    let file_type = read_u32(bytes, base + layout::macho::FILE_TYPE, is_lsb)?;
    if file_type != MH_BUNDLE && file_type != MH_DYLIB {
        return Err(Error::Format(format!(
            "Mach-O file type {} is not a loadable module",
            file_type
        )));
    }
    Ok(platform)
}

fn header_bytes<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| Error::Format(format!("header field at {:#x} is truncated", offset)))
}

fn read_u16(bytes: &[u8], offset: usize, is_lsb: bool) -> Result<u16> {
    let raw = header_bytes::<2>(bytes, offset)?;
    Ok(if is_lsb {
        u16::from_le_bytes(raw)
    } else {
        u16::from_be_bytes(raw)
    })
}

fn read_u32(bytes: &[u8], offset: usize, is_lsb: bool) -> Result<u32> {
    let raw = header_bytes::<4>(bytes, offset)?;
    Ok(if is_lsb {
        u32::from_le_bytes(raw)
    } else {
        u32::from_be_bytes(raw)
    })
}

fn read_u64(bytes: &[u8], offset: usize, is_lsb: bool) -> Result<u64> {
    let raw = header_bytes::<8>(bytes, offset)?;
    Ok(if is_lsb {
        u64::from_le_bytes(raw)
    } else {
        u64::from_be_bytes(raw)
    })
}
