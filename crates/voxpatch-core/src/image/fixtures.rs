//! Synthetic container images for tests.

use goblin::elf::header::{ELFCLASS64, ELFDATA2LSB, ELFMAG, ET_DYN};
use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86_64};
use goblin::mach::header::{MH_BUNDLE, MH_MAGIC_64};

use super::layout::{self, MACHO_X86_64_SLICE_OFFSET};
use super::{BinaryImage, MemoryStore};

/// 64-bit little-endian `ET_DYN` ELF header followed by zeros.
pub fn elf_image(size: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    bytes[..4].copy_from_slice(ELFMAG);
    bytes[4] = ELFCLASS64;
    bytes[5] = ELFDATA2LSB;
    bytes[6] = 1;
    bytes[layout::ELF_TYPE_OFFSET..layout::ELF_TYPE_OFFSET + 2]
        .copy_from_slice(&ET_DYN.to_le_bytes());
    bytes
}

/// PE32+ headers at 0x80 with the given image base.
pub fn pe_image(size: usize, image_base: u64) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    bytes[..2].copy_from_slice(b"MZ");
    bytes[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    bytes[0x80..0x84].copy_from_slice(b"PE\0\0");
    bytes[0x84..0x86].copy_from_slice(&0x8664u16.to_le_bytes());
    let optional = 0x84 + 20;
    bytes[optional..optional + 2].copy_from_slice(&0x20Bu16.to_le_bytes());
    let base = optional + layout::pe::IMAGE_BASE_PE32_PLUS;
    bytes[base..base + 8].copy_from_slice(&image_base.to_le_bytes());
    bytes
}

fn write_macho_header(bytes: &mut [u8], at: usize, cputype: u32) {
    bytes[at..at + 4].copy_from_slice(&MH_MAGIC_64.to_le_bytes());
    bytes[at + 4..at + 8].copy_from_slice(&cputype.to_le_bytes());
    bytes[at + 8..at + 12].copy_from_slice(&3u32.to_le_bytes());
    bytes[at + 12..at + 16].copy_from_slice(&MH_BUNDLE.to_le_bytes());
}

/// Thin x86_64 `MH_BUNDLE`.
pub fn thin_macho_image(size: usize) -> Vec<u8> {
    thin_macho_image_for(size, CPU_TYPE_X86_64)
}

pub fn thin_macho_image_for(size: usize, cputype: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    write_macho_header(&mut bytes, 0, cputype);
    bytes
}

fn write_fat_arch(bytes: &mut [u8], index: usize, cputype: u32, offset: usize, size: usize) {
    let at = 8 + index * 20;
    bytes[at..at + 4].copy_from_slice(&cputype.to_be_bytes());
    bytes[at + 4..at + 8].copy_from_slice(&3u32.to_be_bytes());
    bytes[at + 8..at + 12].copy_from_slice(&(offset as u32).to_be_bytes());
    bytes[at + 12..at + 16].copy_from_slice(&(size as u32).to_be_bytes());
    bytes[at + 16..at + 20].copy_from_slice(&14u32.to_be_bytes());
}

/// Universal binary with a single x86_64 slice at the family offset.
pub fn universal_image(slice_size: usize, total: usize) -> Vec<u8> {
    let slice = MACHO_X86_64_SLICE_OFFSET as usize;
    let mut bytes = vec![0u8; total];
    bytes[..4].copy_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    bytes[4..8].copy_from_slice(&1u32.to_be_bytes());
    write_fat_arch(&mut bytes, 0, CPU_TYPE_X86_64, slice, slice_size);
    write_macho_header(&mut bytes, slice, CPU_TYPE_X86_64);
    bytes
}

/// Universal binary with the x86_64 slice at the family offset and an arm64
/// slice wherever `arm_offset` puts it.
pub fn universal_image_with_arm64(
    slice_size: usize,
    arm_offset: usize,
    arm_size: usize,
    total: usize,
) -> Vec<u8> {
    let mut bytes = universal_image(slice_size, total);
    bytes[4..8].copy_from_slice(&2u32.to_be_bytes());
    write_fat_arch(&mut bytes, 1, CPU_TYPE_ARM64, arm_offset, arm_size);
    write_macho_header(&mut bytes, arm_offset, CPU_TYPE_ARM64);
    bytes
}

/// Place `bytes` at `offset`.
pub fn put(image: &mut [u8], offset: usize, bytes: &[u8]) {
    image[offset..offset + bytes.len()].copy_from_slice(bytes);
}

pub fn memory_image(bytes: Vec<u8>) -> BinaryImage<MemoryStore> {
    BinaryImage::from_store(MemoryStore::new(bytes)).unwrap()
}
