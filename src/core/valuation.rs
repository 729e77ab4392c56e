//! Valuation aggregation: fusing per-item prices, identification
//! confidence, and age signals into one priced recommendation.
//!
//! Totals are exact sums with no rounding before presentation. The
//! aggregate confidence is value-weighted so a confidently-identified
//! two-dollar part cannot dominate the confidence of a high-value
//! uncertain item. The recommendation is a pure function of the total
//! against two thresholds, with a single one-shot vintage bump near the
//! museum boundary; suggested platforms come from a static lookup table.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::core::currency::{CurrencyConverter, RateCollaborator};
use crate::core::models::{
    IdentificationResult, ItemValuation, Platform, PricingBasis, Recommendation, ValuationResult,
};
use crate::core::pricing::ResolvedPrice;
use crate::error::{BrickvalError, Result};

/// Confidence multiplier for items priced at the default minimum. Their
/// amount is a guess, so their say in the aggregate is halved.
pub const DEFAULT_MINIMUM_CONFIDENCE_PENALTY: f64 = 0.5;

// =============================================================================
// Policy
// =============================================================================

/// Configured thresholds governing the recommendation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationPolicy {
    /// At or above this USD total, the lot is museum-grade.
    pub museum_threshold: f64,
    /// At or above this USD total (below museum), the lot is worth reselling.
    pub rare_threshold: f64,
    /// An item older than this many years counts as vintage.
    pub vintage_years_threshold: u32,
    /// Width of the below-museum band in which vintage bumps the category.
    pub vintage_margin_usd: f64,
}

impl ValuationPolicy {
    /// Validate the threshold ordering. Violations are fatal at startup.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid` unless `museum_threshold > rare_threshold > 0` and
    /// the vintage margin is non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.rare_threshold <= 0.0 {
            return Err(BrickvalError::ConfigInvalid {
                key: "rare_threshold".to_string(),
                message: format!("must be positive, got {}", self.rare_threshold),
            });
        }
        if self.museum_threshold <= self.rare_threshold {
            return Err(BrickvalError::ConfigInvalid {
                key: "museum_threshold".to_string(),
                message: format!(
                    "must exceed rare_threshold ({} <= {})",
                    self.museum_threshold, self.rare_threshold
                ),
            });
        }
        if self.vintage_margin_usd < 0.0 {
            return Err(BrickvalError::ConfigInvalid {
                key: "vintage_margin_usd".to_string(),
                message: format!("must be non-negative, got {}", self.vintage_margin_usd),
            });
        }
        Ok(())
    }

    /// Recommendation category for a total, before the vintage modifier.
    #[must_use]
    pub fn base_category(&self, total_usd: f64) -> Recommendation {
        if total_usd >= self.museum_threshold {
            Recommendation::Museum
        } else if total_usd >= self.rare_threshold {
            Recommendation::Resale
        } else {
            Recommendation::Collection
        }
    }

    /// Full recommendation: the base category, bumped up exactly one level
    /// when the lot contains a vintage item and the total falls within the
    /// configured margin below the museum threshold. The bump is a single
    /// terminal transition; it never applies twice.
    #[must_use]
    pub fn recommend(&self, total_usd: f64, has_vintage_item: bool) -> Recommendation {
        let base = self.base_category(total_usd);
        let in_bump_band = total_usd >= self.museum_threshold - self.vintage_margin_usd
            && total_usd < self.museum_threshold;
        if has_vintage_item && in_bump_band {
            base.bumped()
        } else {
            base
        }
    }
}

/// Static platform lookup by recommendation category.
#[must_use]
pub const fn suggested_platforms(category: Recommendation) -> &'static [Platform] {
    match category {
        Recommendation::Museum => &[Platform::Bricklink, Platform::LocalAuction],
        Recommendation::Resale => &[Platform::Bricklink, Platform::Ebay],
        Recommendation::Collection => &[Platform::FacebookMarketplace],
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Sole constructor of [`ValuationResult`]s.
pub struct ValuationAggregator<R> {
    policy: ValuationPolicy,
    converter: CurrencyConverter<R>,
}

impl<R: RateCollaborator> ValuationAggregator<R> {
    #[must_use]
    pub fn new(policy: ValuationPolicy, converter: CurrencyConverter<R>) -> Self {
        Self { policy, converter }
    }

    /// Combine identification output and per-item resolved prices into the
    /// final result. `resolved` is parallel to `identification.items`.
    ///
    /// `as_of` anchors the vintage-age computation so results are
    /// reproducible for a given appraisal date.
    pub async fn aggregate(
        &self,
        identification: &IdentificationResult,
        resolved: &[ResolvedPrice],
        as_of: DateTime<Utc>,
    ) -> ValuationResult {
        assert_eq!(
            identification.items.len(),
            resolved.len(),
            "one resolved price required per identified item"
        );

        let (rate, rate_stale) = self.converter.current_rate().await;

        let mut total_usd = 0.0;
        let mut weighted_confidence = 0.0;
        let mut items = Vec::with_capacity(resolved.len());
        let mut has_vintage_item = false;

        for (item, price) in identification.items.iter().zip(resolved) {
            let amount = price.amount_usd;
            total_usd += amount;

            let effective_confidence = if price.basis == PricingBasis::DefaultMinimum {
                item.confidence * DEFAULT_MINIMUM_CONFIDENCE_PENALTY
            } else {
                item.confidence
            };
            weighted_confidence += effective_confidence * amount;

            has_vintage_item |= item.is_vintage(as_of, self.policy.vintage_years_threshold);

            items.push(ItemValuation {
                item: item.clone(),
                resolved_amount_usd: amount,
                resolved_amount_eur: amount * rate,
                item_confidence: item.confidence,
                pricing_basis: price.basis,
            });
        }

        // Value-weighted average, defined as 0 for a zero-value lot.
        let overall_confidence = if total_usd > 0.0 {
            (weighted_confidence / total_usd).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let recommendation = self.policy.recommend(total_usd, has_vintage_item);

        info!(
            total_usd,
            overall_confidence,
            %recommendation,
            items = items.len(),
            "valuation aggregated"
        );

        ValuationResult {
            total_usd,
            total_eur: total_usd * rate,
            overall_confidence,
            recommendation,
            suggested_platforms: suggested_platforms(recommendation).to_vec(),
            items,
            exchange_rate: rate,
            rate_stale,
            description: identification.description.clone(),
        }
    }
}
