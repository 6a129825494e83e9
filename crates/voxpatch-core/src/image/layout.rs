//! Address translation constants of the target family.
//!
//! These are properties of how the supported toolchains lay out the voice
//! module, not values discovered from the file:
//!
//! ```text
//!   PE (MSVC)            .text  RVA 0x1000  ->  raw 0x400      file = rva - 0xC00
//!   ELF (PIC .so)        first PT_LOAD at vaddr 0, offset 0     file = va
//!   Mach-O (thin)        __TEXT vmaddr 0, fileoff 0             file = va
//!   Mach-O (universal)   x86_64 slice at 0x4000                 file = va - (-0x4000)
//! ```

/// Bytes inspected for container detection.
pub const HEADER_PEEK_SIZE: usize = 16;

/// RVA minus raw offset of the PE code section.
pub const PE_TEXT_ADJUSTMENT: u64 = 0xC00;

/// File offset of the x86_64 slice inside the universal Mach-O.
pub const MACHO_X86_64_SLICE_OFFSET: u64 = 0x4000;

/// Offset of `e_type` in the ELF identification header.
pub const ELF_TYPE_OFFSET: usize = 16;

/// Offsets inside a Mach-O `mach_header(_64)`.
pub mod macho {
    pub const CPU_TYPE: usize = 4;
    pub const FILE_TYPE: usize = 12;
}

/// Offsets inside the PE optional header.
pub mod pe {
    pub const IMAGE_BASE_PE32: usize = 28;
    pub const IMAGE_BASE_PE32_PLUS: usize = 24;
}
