//! Offset resolver for catalog targets
//!
//! Every applicable target goes through up to three search phases, stopping
//! at the first success:
//!
//! 1. direct signature scan over the slice's scan range, falling back to
//!    the signature as it reads after the patch was written
//! 2. derivation from an already-resolved target (`from + delta`)
//! 3. exact-byte search in a bounded window around a derived or last-known
//!    location
//!
//! A fourth phase cross-validates every derivation rule once all targets
//! have been visited. A violation unresolves both ends of the rule, and
//! anything derived from an unresolved target follows it.
//!
//! A resolver works on one code slice. Universal images are resolved once
//! per slice.

pub mod constants;
mod types;

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, DerivationRule, PatchTarget, TargetVariant};
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::image::{BinaryImage, ByteStore, Slice};
use crate::signature::{Pattern, find_exact};

pub use types::*;

#[derive(Debug, Clone)]
struct Found {
    offset: usize,
    method: ResolutionMethod,
    source: Option<String>,
}

#[derive(Debug, Default)]
struct TargetState {
    found: Option<Found>,
    attempts: Vec<PhaseAttempt>,
}

impl TargetState {
    fn fail(&mut self, phase: Phase, failure: PhaseFailure) {
        self.attempts.push(PhaseAttempt::new(phase, failure));
    }

    fn resolve(mut self, offset: usize, method: ResolutionMethod, source: Option<&str>) -> Self {
        self.found = Some(Found {
            offset,
            method,
            source: source.map(str::to_string),
        });
        self
    }

    fn invalidate(&mut self, failure: PhaseFailure) {
        self.found = None;
        self.fail(Phase::CrossValidation, failure);
    }
}

/// Compiled signature plus anchor.
struct Scanner {
    pattern: Pattern,
    /// The signature with the payload laid over it, when the payload
    /// rewrites literal bytes of the signature.
    applied: Option<Pattern>,
    anchor: usize,
}

impl Scanner {
    fn new(variant: &TargetVariant) -> Result<Option<Self>> {
        let Some(signature) = &variant.signature else {
            return Ok(None);
        };
        let pattern = signature.compile()?;
        let written: Vec<Option<u8>> = match variant.payload.fixed_bytes() {
            Some(bytes) => bytes.iter().copied().map(Some).collect(),
            None => vec![None; variant.patch_len()],
        };
        let applied = pattern.overlay(signature.anchor, &written);

        Ok(Some(Self {
            pattern,
            applied,
            anchor: signature.anchor,
        }))
    }

    fn matches_at(&self, bytes: &[u8], start: usize) -> bool {
        self.pattern.matches_at(bytes, start)
            || self
                .applied
                .as_ref()
                .is_some_and(|applied| applied.matches_at(bytes, start))
    }
}

pub struct OffsetResolver<'a, S: ByteStore> {
    image: &'a BinaryImage<S>,
    slice: &'a Slice,
    catalog: &'a Catalog,
    config: &'a ResolverConfig,
}

impl<'a, S: ByteStore> OffsetResolver<'a, S> {
    /// Resolver over the image's primary slice.
    pub fn new(image: &'a BinaryImage<S>, catalog: &'a Catalog, config: &'a ResolverConfig) -> Self {
        Self::for_slice(image, image.primary(), catalog, config)
    }

    pub fn for_slice(
        image: &'a BinaryImage<S>,
        slice: &'a Slice,
        catalog: &'a Catalog,
        config: &'a ResolverConfig,
    ) -> Self {
        Self {
            image,
            slice,
            catalog,
            config,
        }
    }

    /// Resolve every target that has a variant for the slice's platform.
    pub fn resolve(&self) -> Result<ResolutionReport> {
        let platform = self.slice.platform;
        let order = self.catalog.derivation_order(platform)?;
        let rules = self.catalog.rules_for(platform);
        debug!(
            "Resolving {} target(s) for {} with {} derivation rule(s)",
            order.len(),
            platform,
            rules.len()
        );

        let mut states: HashMap<&'a str, TargetState> = HashMap::new();
        for target in order {
            let Some(variant) = target.variant(platform) else {
                continue;
            };
            let state = self.resolve_target(target, variant, &rules, &states)?;
            states.insert(target.id.as_str(), state);
        }

        debug!("Phase 4: cross-validating derivation rules...");
        self.cross_validate(&rules, &mut states);

        let targets = self
            .catalog
            .targets_for(platform)
            .filter_map(|target| {
                let state = states.remove(target.id.as_str())?;
                Some(self.finish(target, state))
            })
            .collect();

        Ok(ResolutionReport {
            catalog_version: self.catalog.version.clone(),
            platform,
            format: self.image.format(),
            targets,
        })
    }

    fn resolve_target(
        &self,
        target: &PatchTarget,
        variant: &TargetVariant,
        rules: &[&DerivationRule],
        states: &HashMap<&'a str, TargetState>,
    ) -> Result<TargetState> {
        let mut state = TargetState::default();
        let site_len = variant.site_len();
        let scanner = Scanner::new(variant)?;

        // Phase 1: direct signature
        debug!("{}: phase 1 (direct signature)", target.id);
        let mut ambiguous = false;
        match &scanner {
            None => state.fail(Phase::DirectSignature, PhaseFailure::NoSignature),
            Some(scanner) => match self.scan_signature(&target.id, scanner).as_slice() {
                [] => state.fail(Phase::DirectSignature, PhaseFailure::NoMatch),
                [site] if self.fits(*site, site_len) => {
                    debug!("  {}: unique signature match at 0x{:X}", target.id, site);
                    return Ok(state.resolve(*site, ResolutionMethod::DirectSignature, None));
                }
                [site] => state.fail(Phase::DirectSignature, self.out_of_range(*site, site_len)),
                sites => {
                    warn!(
                        "{}: signature matched {} sites, not guessing",
                        target.id,
                        sites.len()
                    );
                    ambiguous = true;
                    state.fail(
                        Phase::DirectSignature,
                        PhaseFailure::Ambiguous {
                            offsets: self.capped(sites),
                        },
                    );
                }
            },
        }

        // Phase 2: derivation
        debug!("{}: phase 2 (derivation)", target.id);
        let derived: Vec<(usize, &str)> = rules
            .iter()
            .filter(|rule| rule.to == target.id)
            .filter_map(|rule| {
                let from = states.get(rule.from.as_str())?.found.as_ref()?;
                Some((rule.apply(from.offset)?, rule.from.as_str()))
            })
            .collect();

        if derived.is_empty() {
            state.fail(Phase::Derivation, PhaseFailure::NoDerivation);
        } else {
            let mut consistent: Vec<(usize, &str)> = derived
                .iter()
                .copied()
                .filter(|(candidate, _)| self.is_consistent(variant, scanner.as_ref(), *candidate))
                .collect();
            consistent.sort_by_key(|(candidate, _)| *candidate);
            consistent.dedup_by_key(|(candidate, _)| *candidate);

            match consistent.as_slice() {
                [(offset, source)] => {
                    debug!(
                        "  {}: derived from {} at 0x{:X}",
                        target.id, source, offset
                    );
                    return Ok(state.resolve(*offset, ResolutionMethod::Derived, Some(*source)));
                }
                [] => state.fail(
                    Phase::Derivation,
                    PhaseFailure::Inconsistent {
                        candidates: derived.iter().map(|(c, _)| *c).collect(),
                    },
                ),
                many => state.fail(
                    Phase::Derivation,
                    PhaseFailure::ConflictingDerivations {
                        candidates: many.iter().map(|(c, _)| *c).collect(),
                    },
                ),
            }
        }

        // Phase 3: fuzzy window
        if ambiguous {
            state.fail(Phase::FuzzyWindow, PhaseFailure::SkippedAfterAmbiguity);
            return Ok(state);
        }

        debug!("{}: phase 3 (fuzzy window)", target.id);
        let mut centres: Vec<usize> = derived.iter().map(|(candidate, _)| *candidate).collect();
        if let Some(va) = variant.last_known_va {
            match self.slice.to_file_offset(va) {
                Some(offset) => centres.push(offset),
                None => debug!(
                    "  {}: last-known address 0x{:X} lies outside the {} slice",
                    target.id, va, self.slice.platform
                ),
            }
        }
        let mut seen = HashSet::new();
        centres.retain(|centre| seen.insert(*centre));

        if centres.is_empty() {
            state.fail(Phase::FuzzyWindow, PhaseFailure::NoWindow);
            return Ok(state);
        }

        for centre in centres {
            let window = self.window(centre, site_len);
            debug!(
                "  {}: searching 0x{:X}..0x{:X} around 0x{:X}",
                target.id, window.start, window.end, centre
            );

            let mut hits = self.search_window(&variant.expected, &window, site_len);
            if hits.is_empty()
                && let Some(patch) = variant.payload.fixed_bytes()
            {
                hits = self.search_window(patch, &window, site_len);
            }

            match hits.as_slice() {
                [] => continue,
                [hit] => {
                    warn!(
                        "{}: fell back to fuzzy search, found at 0x{:X} (window centre 0x{:X})",
                        target.id, hit, centre
                    );
                    return Ok(state.resolve(*hit, ResolutionMethod::FuzzySearch, None));
                }
                many => {
                    state.fail(
                        Phase::FuzzyWindow,
                        PhaseFailure::Ambiguous {
                            offsets: self.capped(many),
                        },
                    );
                    return Ok(state);
                }
            }
        }

        state.fail(Phase::FuzzyWindow, PhaseFailure::NoMatch);
        Ok(state)
    }

    fn cross_validate(&self, rules: &[&DerivationRule], states: &mut HashMap<&'a str, TargetState>) {
        let offset_of = |states: &HashMap<&'a str, TargetState>, id: &str| {
            states.get(id)?.found.as_ref().map(|found| found.offset)
        };

        let mut violations = Vec::new();
        for rule in rules {
            let (Some(from), Some(to)) = (
                offset_of(states, &rule.from),
                offset_of(states, &rule.to),
            ) else {
                continue;
            };
            let actual = to as i64 - from as i64;
            if actual != rule.delta {
                warn!(
                    "Derivation {} -> {} violated: expected {}, found {}",
                    rule.from,
                    rule.to,
                    format_delta(rule.delta),
                    format_delta(actual)
                );
                violations.push(PhaseFailure::DeltaViolation {
                    from: rule.from.clone(),
                    to: rule.to.clone(),
                    expected: rule.delta,
                    actual,
                });
            }
        }

        for failure in violations {
            let PhaseFailure::DeltaViolation { from, to, .. } = &failure else {
                continue;
            };
            for id in [from.as_str(), to.as_str()] {
                if let Some(state) = states.get_mut(id) {
                    state.invalidate(failure.clone());
                }
            }
        }

        loop {
            let orphaned: Vec<(&'a str, String)> = states
                .iter()
                .filter_map(|(id, state)| {
                    let source = state.found.as_ref()?.source.as_ref()?;
                    let lost = states
                        .get(source.as_str())
                        .is_none_or(|source_state| source_state.found.is_none());
                    lost.then(|| (*id, source.clone()))
                })
                .collect();

            if orphaned.is_empty() {
                break;
            }

            for (id, source) in orphaned {
                warn!("{}: derivation source {} is unresolved", id, source);
                if let Some(state) = states.get_mut(id) {
                    state.invalidate(PhaseFailure::SourceUnresolved { source });
                }
            }
        }
    }

    fn finish(&self, target: &PatchTarget, state: TargetState) -> TargetResolution {
        match state.found {
            Some(found) => {
                info!(
                    "{}: 0x{:X} ({})",
                    target.id, found.offset, found.method
                );
                TargetResolution::Resolved(ResolvedOffset {
                    target_id: target.id.clone(),
                    offset: found.offset,
                    method: found.method,
                    source: found.source,
                    va: self.slice.to_va(found.offset),
                })
            }
            None => {
                let unresolved = UnresolvedTarget {
                    target_id: target.id.clone(),
                    attempts: state.attempts,
                };
                warn!("{}: unresolved ({})", target.id, unresolved.summary());
                TargetResolution::Unresolved(unresolved)
            }
        }
    }

    /// Patch sites of every signature match. A site that has already been
    /// written no longer matches the original signature, so the applied
    /// form is tried when the original finds nothing.
    fn scan_signature(&self, id: &str, scanner: &Scanner) -> Vec<usize> {
        let sites = self.scan(&scanner.pattern, scanner.anchor);
        if !sites.is_empty() {
            return sites;
        }
        let Some(applied) = &scanner.applied else {
            return sites;
        };

        let sites = self.scan(applied, scanner.anchor);
        if !sites.is_empty() {
            debug!("  {}: signature matched in its patched form", id);
        }
        sites
    }

    /// Patch sites (match start + anchor) of every match of `pattern`.
    fn scan(&self, pattern: &Pattern, anchor: usize) -> Vec<usize> {
        pattern
            .find_in(self.image.bytes(), self.slice.scan_range.clone(), self.scan_limit())
            .into_iter()
            .map(|start| start.saturating_add(anchor))
            .collect()
    }

    fn search_window(&self, needle: &[u8], window: &Range<usize>, site_len: usize) -> Vec<usize> {
        find_exact(self.image.bytes(), needle, window.clone(), self.scan_limit())
            .into_iter()
            .filter(|hit| self.fits(*hit, site_len))
            .collect()
    }

    fn is_consistent(&self, variant: &TargetVariant, scanner: Option<&Scanner>, candidate: usize) -> bool {
        if !self.fits(candidate, variant.site_len()) {
            return false;
        }

        let bytes = self.image.bytes();
        match scanner {
            Some(scanner) => candidate
                .checked_sub(scanner.anchor)
                .filter(|start| self.fits(*start, scanner.pattern.len()))
                .is_some_and(|start| scanner.matches_at(bytes, start)),
            // An injected slot without a signature has nothing stable to
            // check; validation against expected bytes gates the write.
            None if variant.payload.is_injected() => true,
            None => variant.holds_expected(bytes, candidate) || variant.holds_patch(bytes, candidate),
        }
    }

    fn window(&self, centre: usize, site_len: usize) -> Range<usize> {
        let range = &self.slice.scan_range;
        let start = centre
            .saturating_sub(self.config.fuzzy_window)
            .max(range.start);
        let end = centre
            .saturating_add(self.config.fuzzy_window)
            .saturating_add(site_len)
            .min(range.end);
        start..end.max(start)
    }

    /// Whether `length` bytes at `offset` lie inside the slice.
    fn fits(&self, offset: usize, length: usize) -> bool {
        self.slice.contains(offset, length)
    }

    fn out_of_range(&self, offset: usize, length: usize) -> PhaseFailure {
        PhaseFailure::OutOfRange {
            offset: offset as u64,
            length,
            size: self.image.len(),
        }
    }

    fn scan_limit(&self) -> usize {
        self.config.max_reported_candidates.max(2)
    }

    fn capped(&self, offsets: &[usize]) -> Vec<usize> {
        offsets
            .iter()
            .take(self.config.max_reported_candidates)
            .copied()
            .collect()
    }
}
