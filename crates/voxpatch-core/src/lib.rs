//! # voxpatch-core
//!
//! Core library for the voxpatch binary patcher.
//!
//! This crate provides:
//! - Container detection and address translation for PE, ELF and Mach-O images
//! - A versioned catalog of patch targets with wildcard signatures
//! - Multi-phase offset resolution (signature, derivation, fuzzy window)
//!   with cross-validation of derivation rules
//! - All-or-nothing patch transactions with rollback and restore points
//! - Splicing of externally compiled function bodies into fixed slots

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod hex;
pub mod image;
pub mod inject;
pub mod resolver;
pub mod signature;
pub mod status;
pub mod transaction;

pub use catalog::{
    Catalog, Category, DerivationRule, PatchTarget, Payload, TargetVariant, builtin_catalog,
    load_catalog, save_catalog,
};
pub use config::{Config, ResolverConfig};
pub use engine::{Engine, PatchOutcome};
pub use error::{Error, Result};
pub use hex::{HexBytes, format_hex, format_hex_truncated, parse_hex};
pub use image::{
    AddressTranslation, Arch, BinaryImage, ByteStore, ContainerFormat, FileStore, MemoryStore,
    Platform, Slice,
};
pub use inject::{InjectedFunctionBody, splice};
pub use resolver::{
    OffsetResolver, Phase, PhaseAttempt, PhaseFailure, ResolutionMethod, ResolutionReport,
    ResolvedOffset, TargetResolution, UnresolvedTarget,
};
pub use signature::{Signature, format_pattern, parse_pattern};
pub use status::{PatchStatus, SiteStatus, StatusReport, TargetStatus, inspect};
pub use transaction::{
    CapturedRange, PatchEntry, PatchTransaction, RestorePoint, SiteState, TransactionStatus,
    restore,
};
