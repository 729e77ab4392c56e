//! Vision identification, gated by admission control.
//!
//! The orchestrator never talks to the vision collaborator without first
//! holding an [`AdmissionGrant`](crate::core::scheduler::AdmissionGrant).
//! On a bounded denial it suspends for exactly the reported retry duration
//! and re-attempts once; a second denial surfaces as `RateLimitExceeded`
//! rather than looping, so worst-case latency stays bounded.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::models::{
    IdentificationResult, IdentifiedItem, ImageDescriptor, ItemCategory, ItemCondition,
};
use crate::core::scheduler::{AdmissionScheduler, AdmitError, estimate_vision_cost};
use crate::error::{BrickvalError, Result};

// =============================================================================
// Collaborator Contract
// =============================================================================

/// Raw per-item record as the vision service reports it. Fields the model
/// omitted or mangled arrive as `None` and are defaulted during
/// normalization; one bad field never fails the batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIdentifiedItem {
    pub name: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub year: Option<i32>,
    pub theme: Option<String>,
    pub confidence: Option<f64>,
}

/// Raw output of one vision call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIdentification {
    pub items: Vec<RawIdentifiedItem>,
    pub description: Option<String>,
    pub overall_confidence: Option<f64>,
}

/// The external vision service, as the core sees it: image in, raw item
/// list plus confidence out.
pub trait VisionCollaborator: Send + Sync {
    fn identify_raw(
        &self,
        image: &ImageDescriptor,
    ) -> impl Future<Output = Result<RawIdentification>> + Send;
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Calls the vision collaborator through the admission scheduler and
/// normalizes its output into typed items.
pub struct IdentificationOrchestrator<V> {
    vision: V,
    scheduler: Arc<AdmissionScheduler>,
    /// Bound on how long one admission attempt may wait in the queue.
    admit_deadline: Duration,
}

impl<V: VisionCollaborator> IdentificationOrchestrator<V> {
    #[must_use]
    pub fn new(vision: V, scheduler: Arc<AdmissionScheduler>, admit_deadline: Duration) -> Self {
        Self {
            vision,
            scheduler,
            admit_deadline,
        }
    }

    /// Identify the items in one photograph.
    ///
    /// # Errors
    ///
    /// - `RateLimitExceeded` after two denials (the second is not retried).
    /// - `AdmissionDeadline` when the queue wait exceeds the deadline.
    /// - `UpstreamIdentification` when the vision call itself fails.
    pub async fn identify(&self, image: &ImageDescriptor) -> Result<IdentificationResult> {
        let costs = [estimate_vision_cost(image), 1];
        debug!(token_cost = costs[0], "requesting admission for vision call");

        let grant = match self.scheduler.admit(&costs, self.admit_deadline).await {
            Ok(grant) => grant,
            Err(AdmitError::Denied { retry_after }) => {
                // Suspend exactly as instructed and re-attempt once. A second
                // denial is surfaced, not silently retried again.
                info!(
                    retry_secs = retry_after.as_secs(),
                    "admission denied, waiting once for budget"
                );
                tokio::time::sleep(retry_after).await;
                match self.scheduler.admit(&costs, self.admit_deadline).await {
                    Ok(grant) => grant,
                    Err(AdmitError::Denied { retry_after }) => {
                        return Err(BrickvalError::RateLimitExceeded { retry_after });
                    }
                    Err(other) => return Err(map_admit_error(other)),
                }
            }
            Err(other) => return Err(map_admit_error(other)),
        };

        debug!(ticket = grant.ticket(), "admitted, invoking vision service");
        let raw = self
            .vision
            .identify_raw(image)
            .await
            .map_err(|e| BrickvalError::UpstreamIdentification {
                message: e.to_string(),
            })?;

        Ok(normalize(raw))
    }
}

fn map_admit_error(err: AdmitError) -> BrickvalError {
    match err {
        AdmitError::Denied { retry_after } => BrickvalError::RateLimitExceeded { retry_after },
        AdmitError::DeadlineExceeded { deadline } => BrickvalError::AdmissionDeadline { deadline },
        AdmitError::CostExceedsBudget {
            tracker,
            cost,
            budget,
        } => BrickvalError::CostExceedsBudget {
            tracker,
            cost,
            budget,
        },
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Name given to items the vision service reported without one.
const UNNAMED_ITEM: &str = "unidentified item";

/// Normalize raw vision output into the typed model.
///
/// Unknown or missing fields get explicit defaults rather than failing the
/// batch: partial identification beats total failure.
#[must_use]
pub fn normalize(raw: RawIdentification) -> IdentificationResult {
    let items = raw
        .items
        .into_iter()
        .map(|raw_item| {
            let name = raw_item
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNNAMED_ITEM.to_string());
            let category = raw_item
                .category
                .as_deref()
                .map_or(ItemCategory::Other, ItemCategory::from_wire);
            let condition = raw_item
                .condition
                .as_deref()
                .map_or(ItemCondition::UsedComplete, ItemCondition::from_wire);
            let theme = raw_item.theme.filter(|t| !t.trim().is_empty());

            if raw_item.confidence.is_none() {
                warn!(%name, "vision item missing confidence, defaulting to 0");
            }

            IdentifiedItem {
                name,
                category,
                condition,
                year: raw_item.year,
                theme,
                confidence: raw_item.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            }
        })
        .collect();

    IdentificationResult {
        items,
        description: raw.description.unwrap_or_default(),
        overall_confidence: raw.overall_confidence.unwrap_or(0.0).clamp(0.0, 1.0),
    }
}
