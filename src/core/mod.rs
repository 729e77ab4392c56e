//! Core appraisal engine: admission control, identification, pricing,
//! currency, and valuation aggregation.

pub mod budget;
pub mod currency;
pub mod identify;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod pricing;
pub mod scheduler;
pub mod valuation;

pub use budget::{AdmissionDecision, RateBudgetTracker};
pub use currency::{Conversion, CurrencyConverter, RateCollaborator};
pub use identify::{
    IdentificationOrchestrator, RawIdentification, RawIdentifiedItem, VisionCollaborator,
    normalize,
};
pub use models::{
    IdentificationResult, IdentifiedItem, ImageDescriptor, ItemCategory, ItemCondition,
    ItemValuation, Platform, PricePoint, PriceTier, PricingBasis, Recommendation, ValuationResult,
};
pub use pipeline::AppraisalPipeline;
pub use pricing::{MarketplaceCollaborator, PriceResolver, ResolvedPrice, select_price};
pub use scheduler::{AdmissionGrant, AdmissionScheduler, AdmitError, estimate_vision_cost};
pub use valuation::{ValuationAggregator, ValuationPolicy, suggested_platforms};
