//! One-call entry points over resolver, transaction and status.

use tracing::info;

use crate::catalog::{Catalog, Payload, builtin_catalog};
use crate::config::Config;
use crate::error::Result;
use crate::image::{BinaryImage, ByteStore, Platform};
use crate::inject::InjectedFunctionBody;
use crate::resolver::{OffsetResolver, ResolutionReport};
use crate::status::{self, StatusReport};
use crate::transaction::PatchTransaction;

/// Reports and transaction of a plan or apply run.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// One report per slice, primary first.
    pub reports: Vec<ResolutionReport>,
    pub transaction: PatchTransaction,
}

impl PatchOutcome {
    pub fn report(&self, platform: Platform) -> Option<&ResolutionReport> {
        self.reports.iter().find(|report| report.platform == platform)
    }

    /// File offset of `id` in whichever slice resolved it first.
    pub fn offset(&self, id: &str) -> Option<usize> {
        self.reports.iter().find_map(|report| report.offset(id))
    }
}

pub struct Engine {
    catalog: Catalog,
    config: Config,
}

impl Engine {
    /// Validates the catalog up front.
    pub fn new(catalog: Catalog, config: Config) -> Result<Self> {
        catalog.validate()?;
        info!(
            "Catalog {} with {} targets",
            catalog.version,
            catalog.targets.len()
        );
        Ok(Self { catalog, config })
    }

    pub fn with_builtin_catalog(config: Config) -> Result<Self> {
        Self::new(builtin_catalog()?, config)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Slot length of an injection target on `platform`.
    pub fn slot_len(&self, platform: Platform, target_id: &str) -> Option<usize> {
        let variant = self.catalog.target(target_id)?.variant(platform)?;
        match variant.payload {
            Payload::InjectedBody { slot_len } => Some(slot_len),
            Payload::Bytes { .. } => None,
        }
    }

    /// Resolve every slice of the image, primary first.
    pub fn resolve<S: ByteStore>(&self, image: &BinaryImage<S>) -> Result<Vec<ResolutionReport>> {
        image
            .slices()
            .iter()
            .map(|slice| {
                OffsetResolver::for_slice(image, slice, &self.catalog, &self.config.resolver)
                    .resolve()
            })
            .collect()
    }

    pub fn status<S: ByteStore>(&self, image: &BinaryImage<S>) -> Result<Vec<StatusReport>> {
        Ok(self
            .resolve(image)?
            .iter()
            .map(|report| status::inspect(image, report, &self.catalog))
            .collect())
    }

    /// Build and validate one transaction over existing reports.
    pub fn prepare<S: ByteStore>(
        &self,
        image: &BinaryImage<S>,
        reports: &[ResolutionReport],
        bodies: &[InjectedFunctionBody],
    ) -> Result<PatchTransaction> {
        let mut transaction = PatchTransaction::build_all(reports, &self.catalog, bodies)?;
        transaction.validate(image)?;
        Ok(transaction)
    }

    /// Resolve and validate without writing anything.
    pub fn plan<S: ByteStore>(
        &self,
        image: &BinaryImage<S>,
        bodies: &[InjectedFunctionBody],
    ) -> Result<PatchOutcome> {
        let reports = self.resolve(image)?;
        let transaction = self.prepare(image, &reports, bodies)?;
        Ok(PatchOutcome {
            reports,
            transaction,
        })
    }

    pub fn apply<S: ByteStore>(
        &self,
        image: &mut BinaryImage<S>,
        bodies: &[InjectedFunctionBody],
    ) -> Result<PatchOutcome> {
        let reports = self.resolve(image)?;
        self.apply_resolved(image, reports, bodies)
    }

    /// Commit against reports the caller already holds. All slices are
    /// written by a single flush.
    pub fn apply_resolved<S: ByteStore>(
        &self,
        image: &mut BinaryImage<S>,
        reports: Vec<ResolutionReport>,
        bodies: &[InjectedFunctionBody],
    ) -> Result<PatchOutcome> {
        let mut transaction = self.prepare(image, &reports, bodies)?;
        transaction.commit(image)?;
        Ok(PatchOutcome {
            reports,
            transaction,
        })
    }
}
