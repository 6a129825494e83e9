//! Wildcard byte signatures.

use std::ops::Range;

use memchr::memmem;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A scanning signature. The patch site sits `anchor` bytes after the start
/// of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub pattern: String,
    #[serde(default)]
    pub anchor: usize,
}

impl Signature {
    pub fn new(pattern: impl Into<String>, anchor: usize) -> Self {
        Self {
            pattern: pattern.into(),
            anchor,
        }
    }

    pub fn pattern_bytes(&self) -> Result<Vec<Option<u8>>> {
        parse_pattern(&self.pattern)
    }

    pub fn compile(&self) -> Result<Pattern> {
        Ok(Pattern::new(self.pattern_bytes()?))
    }
}

pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::InvalidSignature(format!("Invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidSignature(
            "Signature pattern is empty".to_string(),
        ));
    }

    if bytes.iter().all(Option::is_none) {
        return Err(Error::InvalidSignature(format!(
            "Signature '{}' has no literal bytes",
            pattern
        )));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parsed pattern with its longest literal run kept for prefiltering.
#[derive(Debug, Clone)]
pub struct Pattern {
    bytes: Vec<Option<u8>>,
    run_start: usize,
    run: Vec<u8>,
}

impl Pattern {
    pub fn new(bytes: Vec<Option<u8>>) -> Self {
        let (run_start, run) = longest_literal_run(&bytes);
        Self {
            bytes,
            run_start,
            run,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The pattern as it reads once `written` has been laid over it at
    /// `anchor`. Literal positions take the written byte; a `None` in
    /// `written` (bytes unknown in advance) turns them into wildcards.
    /// Returns `None` when no literal changes.
    pub fn overlay(&self, anchor: usize, written: &[Option<u8>]) -> Option<Pattern> {
        let mut bytes = self.bytes.clone();
        let mut changed = false;

        for (i, value) in written.iter().enumerate() {
            let Some(slot) = anchor.checked_add(i).and_then(|pos| bytes.get_mut(pos)) else {
                break;
            };
            if slot.is_some() && *slot != *value {
                *slot = *value;
                changed = true;
            }
        }

        changed.then(|| Pattern::new(bytes))
    }

    /// Whether the pattern matches `haystack` starting at `pos`.
    pub fn matches_at(&self, haystack: &[u8], pos: usize) -> bool {
        let Some(window) = pos
            .checked_add(self.bytes.len())
            .and_then(|end| haystack.get(pos..end))
        else {
            return false;
        };

        self.bytes
            .iter()
            .zip(window)
            .all(|(expected, actual)| expected.is_none_or(|value| value == *actual))
    }

    /// Start offsets of every match lying wholly inside `range`, stopping
    /// once `limit` matches are collected.
    pub fn find_in(&self, haystack: &[u8], range: Range<usize>, limit: usize) -> Vec<usize> {
        let end = range.end.min(haystack.len());
        let start = range.start.min(end);
        let region = &haystack[start..end];
        let mut results = Vec::new();

        if self.run.is_empty() || region.len() < self.bytes.len() {
            return results;
        }

        for hit in memmem::find_iter(region, &self.run) {
            let Some(candidate) = hit.checked_sub(self.run_start) else {
                continue;
            };
            if self.matches_at(region, candidate) {
                results.push(start + candidate);
                if results.len() >= limit {
                    break;
                }
            }
        }

        results
    }
}

fn longest_literal_run(bytes: &[Option<u8>]) -> (usize, Vec<u8>) {
    let mut best = (0, Vec::new());
    let mut current_start = 0;
    let mut current = Vec::new();

    for (i, byte) in bytes.iter().enumerate() {
        match byte {
            Some(value) => {
                if current.is_empty() {
                    current_start = i;
                }
                current.push(*value);
                if current.len() > best.1.len() {
                    best = (current_start, current.clone());
                }
            }
            None => current.clear(),
        }
    }

    best
}

/// Exact (wildcard-free) search for `needle` inside `range`.
pub fn find_exact(haystack: &[u8], needle: &[u8], range: Range<usize>, limit: usize) -> Vec<usize> {
    let end = range.end.min(haystack.len());
    let start = range.start.min(end);
    if needle.is_empty() {
        return Vec::new();
    }

    memmem::find_iter(&haystack[start..end], needle)
        .map(|pos| start + pos)
        .take(limit)
        .collect()
}
