use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::error::{Error, Result};
use crate::image::{ContainerFormat, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[strum(serialize = "direct signature")]
    DirectSignature,
    #[strum(serialize = "derivation")]
    Derivation,
    #[strum(serialize = "fuzzy window")]
    FuzzyWindow,
    #[strum(serialize = "cross-validation")]
    CrossValidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum ResolutionMethod {
    DirectSignature,
    Derived,
    FuzzySearch,
}

/// Why a phase did not produce an offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PhaseFailure {
    NoSignature,
    NoMatch,
    /// More than one candidate; offsets are capped for reporting.
    Ambiguous { offsets: Vec<usize> },
    /// The only candidate would read or write outside the scan range.
    OutOfRange { offset: u64, length: usize, size: usize },
    /// No rule targets this entry, or no rule source resolved.
    NoDerivation,
    Inconsistent { candidates: Vec<usize> },
    ConflictingDerivations { candidates: Vec<usize> },
    NoWindow,
    SkippedAfterAmbiguity,
    DeltaViolation {
        from: String,
        to: String,
        expected: i64,
        actual: i64,
    },
    SourceUnresolved { source: String },
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSignature => write!(f, "no signature"),
            Self::NoMatch => write!(f, "no match"),
            Self::Ambiguous { offsets } => {
                write!(f, "ambiguous: {}", join_offsets(offsets))
            }
            Self::OutOfRange { offset, length, .. } => {
                write!(f, "{:#x}+{:#x} outside scan range", offset, length)
            }
            Self::NoDerivation => write!(f, "no resolved derivation source"),
            Self::Inconsistent { candidates } => {
                write!(f, "inconsistent candidate(s) {}", join_offsets(candidates))
            }
            Self::ConflictingDerivations { candidates } => {
                write!(f, "rules disagree: {}", join_offsets(candidates))
            }
            Self::NoWindow => write!(f, "no window centre available"),
            Self::SkippedAfterAmbiguity => write!(f, "skipped after ambiguous scan"),
            Self::DeltaViolation {
                from,
                to,
                expected,
                actual,
            } => write!(
                f,
                "{} -> {} is {}, rule says {}",
                from,
                to,
                format_delta(*actual),
                format_delta(*expected)
            ),
            Self::SourceUnresolved { source } => {
                write!(f, "derivation source {} became unresolved", source)
            }
        }
    }
}

pub fn format_delta(delta: i64) -> String {
    if delta < 0 {
        format!("-{:#x}", delta.unsigned_abs())
    } else {
        format!("+{:#x}", delta)
    }
}

fn join_offsets(offsets: &[usize]) -> String {
    offsets
        .iter()
        .map(|o| format!("{:#x}", o))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseAttempt {
    pub phase: Phase,
    #[serde(flatten)]
    pub failure: PhaseFailure,
}

impl PhaseAttempt {
    pub fn new(phase: Phase, failure: PhaseFailure) -> Self {
        Self { phase, failure }
    }
}

impl fmt::Display for PhaseAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.phase, self.failure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOffset {
    pub target_id: String,
    pub offset: usize,
    pub method: ResolutionMethod,
    /// Rule source for derived offsets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Virtual address of `offset`, for reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub va: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedTarget {
    pub target_id: String,
    pub attempts: Vec<PhaseAttempt>,
}

impl UnresolvedTarget {
    /// The most specific error describing this failure.
    pub fn primary_error(&self) -> Error {
        for attempt in &self.attempts {
            if let PhaseFailure::Ambiguous { offsets } = &attempt.failure {
                return Error::AmbiguousMatch {
                    target: self.target_id.clone(),
                    offsets: offsets.clone(),
                };
            }
        }
        for attempt in &self.attempts {
            if let PhaseFailure::OutOfRange {
                offset,
                length,
                size,
            } = &attempt.failure
            {
                return Error::Range {
                    offset: *offset,
                    length: *length,
                    size: *size,
                };
            }
        }
        Error::UnresolvedTargets(vec![self.clone()])
    }

    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetResolution {
    Resolved(ResolvedOffset),
    Unresolved(UnresolvedTarget),
}

impl TargetResolution {
    pub fn target_id(&self) -> &str {
        match self {
            Self::Resolved(resolved) => &resolved.target_id,
            Self::Unresolved(unresolved) => &unresolved.target_id,
        }
    }

    pub fn as_resolved(&self) -> Option<&ResolvedOffset> {
        match self {
            Self::Resolved(resolved) => Some(resolved),
            Self::Unresolved(_) => None,
        }
    }
}

/// Outcome of one resolver run, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub catalog_version: String,
    pub platform: Platform,
    pub format: ContainerFormat,
    pub targets: Vec<TargetResolution>,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved().next().is_none()
    }

    pub fn get(&self, id: &str) -> Option<&TargetResolution> {
        self.targets.iter().find(|t| t.target_id() == id)
    }

    pub fn resolved(&self) -> impl Iterator<Item = &ResolvedOffset> {
        self.targets.iter().filter_map(TargetResolution::as_resolved)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &UnresolvedTarget> {
        self.targets.iter().filter_map(|t| match t {
            TargetResolution::Unresolved(unresolved) => Some(unresolved),
            TargetResolution::Resolved(_) => None,
        })
    }

    pub fn offset(&self, id: &str) -> Option<usize> {
        self.get(id)
            .and_then(TargetResolution::as_resolved)
            .map(|r| r.offset)
    }

    /// Fails with every unresolved target at once.
    pub fn ensure_complete(&self) -> Result<()> {
        let unresolved: Vec<UnresolvedTarget> = self.unresolved().cloned().collect();
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(Error::UnresolvedTargets(unresolved))
        }
    }

    pub fn into_offsets(self) -> Result<BTreeMap<String, ResolvedOffset>> {
        self.ensure_complete()?;
        Ok(self
            .targets
            .into_iter()
            .filter_map(|t| match t {
                TargetResolution::Resolved(resolved) => {
                    Some((resolved.target_id.clone(), resolved))
                }
                TargetResolution::Unresolved(_) => None,
            })
            .collect())
    }
}
