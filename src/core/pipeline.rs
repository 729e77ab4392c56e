//! End-to-end appraisal pipeline.
//!
//! image → identification (gated by admission) → per-item price resolution
//! → aggregation. Price lookups fan out concurrently per item; a single
//! item's failure degrades that item only, never the batch.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::info;

use crate::core::currency::RateCollaborator;
use crate::core::identify::{IdentificationOrchestrator, VisionCollaborator};
use crate::core::models::{ImageDescriptor, ValuationResult};
use crate::core::pricing::{MarketplaceCollaborator, PriceResolver};
use crate::core::valuation::ValuationAggregator;
use crate::error::Result;

/// The full appraisal flow over a set of collaborators.
pub struct AppraisalPipeline<V, M, R> {
    orchestrator: IdentificationOrchestrator<V>,
    resolver: PriceResolver<M>,
    aggregator: ValuationAggregator<R>,
}

impl<V, M, R> AppraisalPipeline<V, M, R>
where
    V: VisionCollaborator,
    M: MarketplaceCollaborator,
    R: RateCollaborator,
{
    #[must_use]
    pub fn new(
        orchestrator: IdentificationOrchestrator<V>,
        resolver: PriceResolver<M>,
        aggregator: ValuationAggregator<R>,
    ) -> Self {
        Self {
            orchestrator,
            resolver,
            aggregator,
        }
    }

    /// Appraise one photograph as of the given date.
    ///
    /// # Errors
    ///
    /// Admission and identification failures abort the run; price
    /// resolution and currency failures degrade it instead.
    pub async fn appraise(
        &self,
        image: &ImageDescriptor,
        as_of: DateTime<Utc>,
    ) -> Result<ValuationResult> {
        let identification = self.orchestrator.identify(image).await?;
        info!(
            items = identification.items.len(),
            overall_confidence = identification.overall_confidence,
            "identification complete"
        );

        let resolved = join_all(
            identification
                .items
                .iter()
                .map(|item| self.resolver.resolve(item)),
        )
        .await;

        Ok(self
            .aggregator
            .aggregate(&identification, &resolved, as_of)
            .await)
    }
}
