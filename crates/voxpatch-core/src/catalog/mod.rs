//! Catalog of patch targets and the derivation rules between them.
//!
//! The catalog is plain data: adding a target means adding an entry, never
//! touching the resolver or the applier. Deltas and signatures are versioned
//! with the catalog and re-validated on every run (see cross-validation in
//! [`crate::resolver`]).

mod builtin;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::Display;

pub use builtin::builtin_catalog;

use crate::error::{Error, Result};
use crate::hex::{HexBytes, opt_address};
use crate::image::Platform;
use crate::signature::Signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Category {
    Stereo,
    Bitrate,
    Filter,
    Encoder,
    Injection,
}

/// What gets written at a resolved site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Fixed replacement bytes.
    Bytes { bytes: HexBytes },
    /// Slot receiving an externally compiled function body.
    InjectedBody { slot_len: usize },
}

impl Payload {
    /// Number of bytes written at the site.
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes { bytes } => bytes.len(),
            Self::InjectedBody { slot_len } => *slot_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fixed_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes { bytes } => Some(bytes),
            Self::InjectedBody { .. } => None,
        }
    }

    pub fn is_injected(&self) -> bool {
        matches!(self, Self::InjectedBody { .. })
    }
}

/// One platform's view of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetVariant {
    /// Exact bytes that must be present before a write is authorized.
    pub expected: HexBytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    pub payload: Payload,
    /// Location in the last build this entry was verified against.
    #[serde(
        default,
        with = "opt_address",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_known_va: Option<u64>,
}

impl TargetVariant {
    pub fn patch_len(&self) -> usize {
        self.payload.len()
    }

    /// Bytes touched by either the validation read or the write.
    pub fn site_len(&self) -> usize {
        self.expected.len().max(self.patch_len())
    }

    pub fn holds_expected(&self, bytes: &[u8], offset: usize) -> bool {
        slice_eq(bytes, offset, &self.expected)
    }

    pub fn holds_patch(&self, bytes: &[u8], offset: usize) -> bool {
        self.payload
            .fixed_bytes()
            .is_some_and(|patch| slice_eq(bytes, offset, patch))
    }
}

fn slice_eq(bytes: &[u8], offset: usize, wanted: &[u8]) -> bool {
    offset
        .checked_add(wanted.len())
        .and_then(|end| bytes.get(offset..end))
        .is_some_and(|actual| actual == wanted)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTarget {
    pub id: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    pub variants: BTreeMap<Platform, TargetVariant>,
}

impl PatchTarget {
    pub fn variant(&self, platform: Platform) -> Option<&TargetVariant> {
        self.variants.get(&platform)
    }
}

/// `to` is expected at `offset(from) + delta` on `platform`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationRule {
    pub platform: Platform,
    pub from: String,
    pub to: String,
    pub delta: i64,
    #[serde(default)]
    pub description: String,
}

impl DerivationRule {
    pub fn apply(&self, from_offset: usize) -> Option<usize> {
        (from_offset as u64)
            .checked_add_signed(self.delta)
            .and_then(|offset| usize::try_from(offset).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: String,
    pub targets: Vec<PatchTarget>,
    #[serde(default)]
    pub derivations: Vec<DerivationRule>,
}

impl Catalog {
    pub fn target(&self, id: &str) -> Option<&PatchTarget> {
        self.targets.iter().find(|target| target.id == id)
    }

    /// Targets with a variant for `platform`, in catalog order.
    pub fn targets_for(&self, platform: Platform) -> impl Iterator<Item = &PatchTarget> {
        self.targets
            .iter()
            .filter(move |target| target.variants.contains_key(&platform))
    }

    pub fn rules_for(&self, platform: Platform) -> Vec<&DerivationRule> {
        self.derivations
            .iter()
            .filter(|rule| rule.platform == platform)
            .filter(|rule| {
                self.target(&rule.from)
                    .is_some_and(|t| t.variants.contains_key(&platform))
                    && self
                        .target(&rule.to)
                        .is_some_and(|t| t.variants.contains_key(&platform))
            })
            .collect()
    }

    /// Applicable targets ordered so every rule's source precedes its
    /// destination. Independent targets keep catalog order.
    pub fn derivation_order(&self, platform: Platform) -> Result<Vec<&PatchTarget>> {
        let rules = self.rules_for(platform);
        let mut pending: Vec<&PatchTarget> = self.targets_for(platform).collect();
        let mut placed: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending.iter().position(|target| {
                rules
                    .iter()
                    .filter(|rule| rule.to == target.id)
                    .all(|rule| placed.contains(rule.from.as_str()))
            });

            let Some(index) = ready else {
                let stuck: Vec<&str> = pending.iter().map(|t| t.id.as_str()).collect();
                return Err(Error::Catalog(format!(
                    "derivation cycle on {} among: {}",
                    platform,
                    stuck.join(", ")
                )));
            };

            let target = pending.remove(index);
            placed.insert(target.id.as_str());
            ordered.push(target);
        }

        Ok(ordered)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::Catalog("version is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.id.as_str()) {
                return Err(Error::Catalog(format!("duplicate target id {}", target.id)));
            }
            if target.variants.is_empty() {
                return Err(Error::Catalog(format!("{} has no variants", target.id)));
            }
            for (platform, variant) in &target.variants {
                validate_variant(&target.id, *platform, variant)?;
            }
        }

        let mut platforms = HashSet::new();
        for rule in &self.derivations {
            for id in [&rule.from, &rule.to] {
                let has_variant = self
                    .target(id)
                    .is_some_and(|t| t.variants.contains_key(&rule.platform));
                if !has_variant {
                    return Err(Error::Catalog(format!(
                        "rule {} -> {} references {} with no {} variant",
                        rule.from, rule.to, id, rule.platform
                    )));
                }
            }
            if rule.from == rule.to {
                return Err(Error::Catalog(format!("rule on {} derives itself", rule.from)));
            }
            platforms.insert(rule.platform);
        }

        for platform in platforms {
            self.derivation_order(platform)?;
        }

        Ok(())
    }
}

fn validate_variant(id: &str, platform: Platform, variant: &TargetVariant) -> Result<()> {
    let fail = |message: String| Err(Error::Catalog(format!("{} ({}): {}", id, platform, message)));

    if variant.expected.is_empty() {
        return fail("expected bytes are empty".to_string());
    }

    match &variant.payload {
        Payload::Bytes { bytes } => {
            if bytes.is_empty() {
                return fail("patch bytes are empty".to_string());
            }
            if bytes[..] == variant.expected[..] {
                return fail("patch bytes equal expected bytes".to_string());
            }
        }
        Payload::InjectedBody { slot_len } => {
            if *slot_len < variant.expected.len() {
                return fail(format!(
                    "slot of {} bytes is shorter than expected bytes ({})",
                    slot_len,
                    variant.expected.len()
                ));
            }
        }
    }

    if let Some(signature) = &variant.signature {
        let pattern = signature.pattern_bytes()?;
        if signature.anchor > pattern.len() {
            return fail(format!(
                "anchor {} lies past the {}-byte signature",
                signature.anchor,
                pattern.len()
            ));
        }
    }

    Ok(())
}

pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let content = fs::read_to_string(&path)?;
    let catalog: Catalog = serde_json::from_str(&content)?;
    catalog.validate()?;
    Ok(catalog)
}

pub fn save_catalog<P: AsRef<Path>>(path: P, catalog: &Catalog) -> Result<()> {
    let content = serde_json::to_string_pretty(catalog)?;
    fs::write(path, content)?;
    Ok(())
}
