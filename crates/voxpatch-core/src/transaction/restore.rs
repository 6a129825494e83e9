//! Pre-patch byte captures and restoring them.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::hex::HexBytes;
use crate::image::{BinaryImage, ByteStore, Platform};

/// Bytes at `offset` before a commit overwrote them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRange {
    pub offset: usize,
    pub bytes: HexBytes,
}

/// Everything needed to undo a committed transaction later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorePoint {
    pub catalog_version: String,
    /// Slices the captured ranges belong to.
    pub platforms: Vec<Platform>,
    pub file_len: usize,
    pub captured_at: DateTime<Utc>,
    pub ranges: Vec<CapturedRange>,
}

impl RestorePoint {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Write every captured range back and flush once.
///
/// Refuses images whose length differs from the capture or that lack one of
/// its slices. Nothing is staged when any range is out of bounds.
pub fn restore<S: ByteStore>(image: &mut BinaryImage<S>, point: &RestorePoint) -> Result<()> {
    if image.len() != point.file_len {
        return Err(Error::RestoreMismatch(format!(
            "image is {} bytes, restore point was taken at {} bytes",
            image.len(),
            point.file_len
        )));
    }
    if let Some(missing) = point
        .platforms
        .iter()
        .find(|platform| image.slice(**platform).is_none())
    {
        return Err(Error::RestoreMismatch(format!(
            "image has no {} slice",
            missing
        )));
    }

    write_ranges(image, &point.ranges)?;
    image.flush()?;
    info!(
        "Restored {} range(s) captured at {}",
        point.ranges.len(),
        point.captured_at
    );
    Ok(())
}

/// Stage every range, or none of them when one falls outside the image.
pub(super) fn write_ranges<S: ByteStore>(
    image: &mut BinaryImage<S>,
    ranges: &[CapturedRange],
) -> Result<()> {
    for range in ranges {
        image.read(range.offset, range.bytes.len())?;
    }
    for range in ranges {
        image.write(range.offset, &range.bytes)?;
    }
    Ok(())
}
