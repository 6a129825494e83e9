//! Search bounds for the fuzzy window phase and diagnostics.
//!
//! ```text
//!            centre - window            centre            centre + window
//!   ... -------|=========================|=========================|------- ...
//!              ^ clipped to scan_range.start        clipped to scan_range.end ^
//! ```
//!
//! A centre is either a derived candidate that failed the consistency check
//! or the last-known address of the target translated through the image.

/// Bytes searched on each side of a window centre.
///
/// Covers the drift seen between consecutive builds of the target module,
/// where functions move by a few hundred to a few thousand bytes.
pub const DEFAULT_FUZZY_WINDOW: usize = 0x4000;

/// Candidate offsets kept in an ambiguity diagnostic. Also bounds the number
/// of hits collected per scan.
pub const DEFAULT_MAX_REPORTED_CANDIDATES: usize = 8;

