//! Core data model for the appraisal pipeline.
//!
//! Every type here is immutable once constructed: the pipeline is
//! append-only, with each stage producing new values from the previous
//! stage's output. Serde derives are present where a value crosses a wire
//! or render boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Item Identification
// =============================================================================

/// Closed set of item categories the vision service can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Minifigure,
    Set,
    Part,
    /// Anything the vision service could not place in the closed set.
    Other,
}

impl ItemCategory {
    /// Parse a wire-format category, defaulting to `Other` for unknowns.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "minifigure" | "minifig" => Self::Minifigure,
            "set" => Self::Set,
            "part" => Self::Part,
            _ => Self::Other,
        }
    }

    /// Marketplace item-type code for price lookups.
    #[must_use]
    pub const fn marketplace_code(self) -> &'static str {
        match self {
            Self::Minifigure => "MINIFIG",
            Self::Set => "SET",
            Self::Part | Self::Other => "PART",
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minifigure => write!(f, "minifigure"),
            Self::Set => write!(f, "set"),
            Self::Part => write!(f, "part"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Assessed physical condition of an identified item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    New,
    UsedComplete,
    UsedIncomplete,
}

impl ItemCondition {
    /// Parse a wire-format condition, defaulting to `UsedComplete`.
    ///
    /// Used-complete is the median assumption for secondhand toy lots, so
    /// an unparseable condition degrades to it rather than failing the item.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "new" | "sealed" | "sealed_new" => Self::New,
            "used_incomplete" | "incomplete" => Self::UsedIncomplete,
            _ => Self::UsedComplete,
        }
    }
}

/// A single item identified in the photograph.
///
/// Created only by the identification orchestrator's normalization step;
/// read-only thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedItem {
    pub name: String,
    pub category: ItemCategory,
    pub condition: ItemCondition,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    /// Per-item identification confidence in [0, 1].
    pub confidence: f64,
}

impl IdentifiedItem {
    /// Whether the item was released more than `years_threshold` years
    /// before `as_of`. Items without a known year are never vintage.
    #[must_use]
    pub fn is_vintage(&self, as_of: DateTime<Utc>, years_threshold: u32) -> bool {
        use chrono::Datelike;
        self.year
            .is_some_and(|year| as_of.year().saturating_sub(year) > years_threshold as i32)
    }
}

/// Normalized output of one identification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationResult {
    pub items: Vec<IdentifiedItem>,

    /// Free-text scene description from the vision service.
    pub description: String,

    /// The vision service's own confidence in the whole analysis, in [0, 1].
    pub overall_confidence: f64,
}

// =============================================================================
// Market Pricing
// =============================================================================

/// Pricing tiers the marketplace reports, and the fixed fallback order
/// walked when an item's own condition has no direct price point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    SealedNew,
    UsedComplete,
    UsedIncomplete,
    Msrp,
    MissingInstructions,
    MissingBox,
}

impl PriceTier {
    /// The fixed fallback priority order. Walked front-to-back when the
    /// preferred tier has no data; the order is part of the audit contract.
    pub const FALLBACK_CHAIN: &'static [Self] = &[
        Self::UsedComplete,
        Self::SealedNew,
        Self::Msrp,
        Self::UsedIncomplete,
        Self::MissingInstructions,
        Self::MissingBox,
    ];

    /// Parse a wire-format tier name.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sealed_new" | "new" => Some(Self::SealedNew),
            "used_complete" | "used" => Some(Self::UsedComplete),
            "used_incomplete" => Some(Self::UsedIncomplete),
            "msrp" | "retail" => Some(Self::Msrp),
            "missing_instructions" => Some(Self::MissingInstructions),
            "missing_box" => Some(Self::MissingBox),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SealedNew => "sealed_new",
            Self::UsedComplete => "used_complete",
            Self::UsedIncomplete => "used_incomplete",
            Self::Msrp => "msrp",
            Self::MissingInstructions => "missing_instructions",
            Self::MissingBox => "missing_box",
        };
        write!(f, "{s}")
    }
}

impl ItemCondition {
    /// The pricing tier directly matching this assessed condition.
    #[must_use]
    pub const fn preferred_tier(self) -> PriceTier {
        match self {
            Self::New => PriceTier::SealedNew,
            Self::UsedComplete => PriceTier::UsedComplete,
            Self::UsedIncomplete => PriceTier::UsedIncomplete,
        }
    }
}

/// One observed market price for an item at a specific tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub tier: PriceTier,
    pub amount_usd: f64,

    /// Identifier of the marketplace/listing the price came from.
    pub source: String,

    pub observed_at: DateTime<Utc>,
}

/// Audit record of which tier actually priced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "tier")]
pub enum PricingBasis {
    /// The item's own assessed condition had a direct price point.
    Exact(PriceTier),
    /// A fallback-chain tier priced the item.
    Fallback(PriceTier),
    /// No tier had any data; the configured default minimum was used.
    DefaultMinimum,
}

impl PricingBasis {
    /// Whether the price is anything other than a direct-condition match.
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        !matches!(self, Self::Exact(_))
    }
}

impl std::fmt::Display for PricingBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(tier) => write!(f, "exact:{tier}"),
            Self::Fallback(tier) => write!(f, "fallback:{tier}"),
            Self::DefaultMinimum => write!(f, "default"),
        }
    }
}

// =============================================================================
// Valuation Output
// =============================================================================

/// Final recommendation for what to do with the appraised lot.
///
/// Ordered: `Collection < Resale < Museum`. The vintage modifier bumps a
/// category up exactly one level, so the ordering is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Collection,
    Resale,
    Museum,
}

impl Recommendation {
    /// The next category up; `Museum` is terminal.
    #[must_use]
    pub const fn bumped(self) -> Self {
        match self {
            Self::Collection => Self::Resale,
            Self::Resale | Self::Museum => Self::Museum,
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collection => write!(f, "collection"),
            Self::Resale => write!(f, "resale"),
            Self::Museum => write!(f, "museum"),
        }
    }
}

/// Sale platforms the aggregator can suggest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Bricklink,
    Ebay,
    FacebookMarketplace,
    LocalAuction,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bricklink => write!(f, "BrickLink"),
            Self::Ebay => write!(f, "eBay"),
            Self::FacebookMarketplace => write!(f, "Facebook Marketplace"),
            Self::LocalAuction => write!(f, "local auction"),
        }
    }
}

/// Per-item valuation, derived and immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemValuation {
    pub item: IdentifiedItem,
    pub resolved_amount_usd: f64,
    pub resolved_amount_eur: f64,
    pub item_confidence: f64,
    pub pricing_basis: PricingBasis,
}

/// Top-level appraisal output; one immutable instance per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResult {
    pub total_usd: f64,
    pub total_eur: f64,

    /// Value-weighted aggregate of per-item confidences, in [0, 1].
    pub overall_confidence: f64,

    pub recommendation: Recommendation,
    pub suggested_platforms: Vec<Platform>,

    /// Per-item breakdown in identification order.
    pub items: Vec<ItemValuation>,

    /// USD→EUR rate applied to every monetary figure above.
    pub exchange_rate: f64,

    /// True when the rate came from an expired cache entry or the static
    /// fallback rather than a fresh fetch.
    pub rate_stale: bool,

    pub description: String,
}

// =============================================================================
// Input
// =============================================================================

/// The photograph handed to the pipeline. Immutable input.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    /// MIME type, e.g. `image/jpeg`.
    pub media_type: String,
    pub data: Vec<u8>,
}

impl ImageDescriptor {
    #[must_use]
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// Payload size in bytes; the basis of the conservative cost estimate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn category_wire_parsing_defaults_to_other() {
        assert_eq!(ItemCategory::from_wire("minifigure"), ItemCategory::Minifigure);
        assert_eq!(ItemCategory::from_wire("SET"), ItemCategory::Set);
        assert_eq!(ItemCategory::from_wire("sticker sheet"), ItemCategory::Other);
    }

    #[test]
    fn condition_wire_parsing_defaults_to_used_complete() {
        assert_eq!(ItemCondition::from_wire("new"), ItemCondition::New);
        assert_eq!(
            ItemCondition::from_wire("gibberish"),
            ItemCondition::UsedComplete
        );
    }

    #[test]
    fn fallback_chain_order_is_fixed() {
        assert_eq!(
            PriceTier::FALLBACK_CHAIN,
            &[
                PriceTier::UsedComplete,
                PriceTier::SealedNew,
                PriceTier::Msrp,
                PriceTier::UsedIncomplete,
                PriceTier::MissingInstructions,
                PriceTier::MissingBox,
            ]
        );
    }

    #[test]
    fn recommendation_bump_is_single_step_and_terminal() {
        assert_eq!(Recommendation::Collection.bumped(), Recommendation::Resale);
        assert_eq!(Recommendation::Resale.bumped(), Recommendation::Museum);
        assert_eq!(Recommendation::Museum.bumped(), Recommendation::Museum);
    }

    #[test]
    fn vintage_requires_known_year_past_threshold() {
        let as_of = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let mut item = IdentifiedItem {
            name: "Classic Spaceman".to_string(),
            category: ItemCategory::Minifigure,
            condition: ItemCondition::UsedComplete,
            year: Some(1999),
            theme: Some("Space".to_string()),
            confidence: 0.9,
        };
        assert!(item.is_vintage(as_of, 20));
        item.year = Some(2020);
        assert!(!item.is_vintage(as_of, 20));
        item.year = None;
        assert!(!item.is_vintage(as_of, 20));
    }
}
