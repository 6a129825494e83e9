//! Addressable in-memory copy of the target module.
//!
//! The whole file is loaded on open. Writes only touch the in-memory buffer;
//! the backing store is replaced in one step by [`BinaryImage::flush`].

mod format;
pub mod layout;
mod store;

#[cfg(test)]
pub mod fixtures;

use std::ops::Range;
use std::path::Path;

use tracing::{debug, info};

pub use format::{AddressTranslation, Arch, ContainerFormat, FormatInfo, Platform, Slice, detect};
pub use store::{ByteStore, FileStore, MemoryStore};

use crate::error::{Error, Result};

pub struct BinaryImage<S: ByteStore = FileStore> {
    store: S,
    buffer: Vec<u8>,
    info: FormatInfo,
    dirty: bool,
}

impl BinaryImage<FileStore> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_store(FileStore::new(path))
    }
}

impl<S: ByteStore> BinaryImage<S> {
    pub fn from_store(mut store: S) -> Result<Self> {
        let buffer = store.load()?;
        let info = detect(&buffer)?;
        if info.slices.is_empty() {
            return Err(Error::Format("no supported code slice".to_string()));
        }
        let platforms: Vec<&'static str> =
            info.slices.iter().map(|slice| slice.platform.into()).collect();
        info!(
            "Opened {} ({}, {} bytes, image base {:#x}, {})",
            store.describe(),
            info.format,
            buffer.len(),
            info.image_base,
            platforms.join(" + ")
        );

        Ok(Self {
            store,
            buffer,
            info,
            dirty: false,
        })
    }

    pub fn format(&self) -> ContainerFormat {
        self.info.format
    }

    /// Platform of the primary slice.
    pub fn platform(&self) -> Platform {
        self.primary().platform
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.info.slices.iter().map(|slice| slice.platform).collect()
    }

    /// Every code slice, primary first. A universal Mach-O carries one per
    /// architecture; other containers carry exactly one.
    pub fn slices(&self) -> &[Slice] {
        &self.info.slices
    }

    pub fn slice(&self, platform: Platform) -> Option<&Slice> {
        self.info.slices.iter().find(|slice| slice.platform == platform)
    }

    pub fn primary(&self) -> &Slice {
        &self.info.slices[0]
    }

    pub fn image_base(&self) -> u64 {
        self.info.image_base
    }

    pub fn translation(&self) -> AddressTranslation {
        self.primary().translation
    }

    /// File range of the primary slice.
    pub fn scan_range(&self) -> Range<usize> {
        self.primary().scan_range.clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// True when staged writes have not been flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn span(&self, offset: usize, length: usize) -> Result<Range<usize>> {
        offset
            .checked_add(length)
            .filter(|end| *end <= self.buffer.len())
            .map(|end| offset..end)
            .ok_or(Error::Range {
                offset: offset as u64,
                length,
                size: self.buffer.len(),
            })
    }

    pub fn read(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let span = self.span(offset, length)?;
        Ok(&self.buffer[span])
    }

    /// Stage `bytes` at `offset`. Never grows the buffer.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let span = self.span(offset, bytes.len())?;
        self.buffer[span].copy_from_slice(bytes);
        self.dirty = true;
        Ok(())
    }

    /// Translate a virtual address relative to the image base, through the
    /// primary slice.
    pub fn va_to_file_offset(&self, va: u64) -> Result<usize> {
        self.primary().to_file_offset(va).ok_or(Error::Range {
                offset: va,
                length: 0,
                size: self.buffer.len(),
            })
    }

    /// Translate an absolute virtual address (image base included).
    pub fn absolute_to_file_offset(&self, va: u64) -> Result<usize> {
        let relative = va.checked_sub(self.info.image_base).ok_or(Error::Range {
            offset: va,
            length: 0,
            size: self.buffer.len(),
        })?;
        self.va_to_file_offset(relative)
    }

    /// Inverse of [`va_to_file_offset`](Self::va_to_file_offset), for reports.
    pub fn file_offset_to_va(&self, offset: usize) -> Option<u64> {
        self.primary().to_va(offset)
    }

    /// Persist the buffer to the backing store.
    pub fn flush(&mut self) -> Result<()> {
        self.store.persist(&self.buffer)?;
        self.dirty = false;
        debug!("Flushed {} bytes to {}", self.buffer.len(), self.store.describe());
        Ok(())
    }
}
