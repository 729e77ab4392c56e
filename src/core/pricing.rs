//! Market price resolution with the condition-pricing fallback chain.
//!
//! Each identified item is looked up against the external marketplace. When
//! the item's own assessed condition has no direct price point, the fixed
//! fallback chain is walked in priority order; the tier that actually
//! priced the item is recorded for auditability. Items with no data at any
//! tier get the configured default minimum rather than zero, because a
//! zero-knowledge value corrupts downstream totals more than an explicit
//! conservative estimate.
//!
//! A marketplace failure for one item never aborts the batch: it degrades
//! that item to the default minimum and is logged.

use tracing::{debug, warn};

use crate::core::models::{IdentifiedItem, ItemCategory, PricePoint, PriceTier, PricingBasis};
use crate::error::Result;

// =============================================================================
// Collaborator Contract
// =============================================================================

/// The external marketplace, as the core sees it: item descriptor in,
/// zero-or-more price points out.
pub trait MarketplaceCollaborator: Send + Sync {
    fn lookup_prices(
        &self,
        category: ItemCategory,
        search_key: &str,
    ) -> impl Future<Output = Result<Vec<PricePoint>>> + Send;
}

// =============================================================================
// Resolution Output
// =============================================================================

/// The outcome of resolving one item's price.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice {
    /// USD amount selected by the chain (or the default minimum).
    pub amount_usd: f64,

    /// Which tier produced the amount.
    pub basis: PricingBasis,

    /// The chosen point, absent when the default minimum was used.
    pub point: Option<PricePoint>,

    /// Every point the marketplace returned, for rendering and audit.
    pub all_points: Vec<PricePoint>,
}

// =============================================================================
// Price Resolver
// =============================================================================

/// Resolves market prices per item via the marketplace collaborator.
pub struct PriceResolver<M> {
    marketplace: M,
    default_minimum_usd: f64,
}

impl<M: MarketplaceCollaborator> PriceResolver<M> {
    #[must_use]
    pub fn new(marketplace: M, default_minimum_usd: f64) -> Self {
        Self {
            marketplace,
            default_minimum_usd,
        }
    }

    /// Resolve one item's price through the fallback chain.
    ///
    /// Never fails: lookup errors and empty results both degrade to the
    /// configured default minimum with `PricingBasis::DefaultMinimum`.
    pub async fn resolve(&self, item: &IdentifiedItem) -> ResolvedPrice {
        let search_key = search_key_for(item);

        let points = match self
            .marketplace
            .lookup_prices(item.category, &search_key)
            .await
        {
            Ok(points) => points,
            Err(err) => {
                warn!(
                    item = %item.name,
                    %search_key,
                    error = %err,
                    "market lookup failed, falling back to default minimum"
                );
                Vec::new()
            }
        };

        let resolved = select_price(item, &points, self.default_minimum_usd);
        debug!(
            item = %item.name,
            amount_usd = resolved.amount_usd,
            basis = %resolved.basis,
            "price resolved"
        );
        resolved
    }
}

/// Marketplace search key for an item: its catalog number when the name
/// carries one (e.g. "sw0001a Luke Skywalker"), else the full name.
#[must_use]
pub fn search_key_for(item: &IdentifiedItem) -> String {
    item.name
        .split_whitespace()
        .next()
        .filter(|token| token.chars().any(|c| c.is_ascii_digit()))
        .unwrap_or(&item.name)
        .to_string()
}

/// Apply the fallback chain over a set of price points.
///
/// The item's assessed condition maps to its preferred tier; if that tier
/// has a point it is an exact basis. Otherwise the fixed chain
/// `used_complete → sealed_new → msrp → used_incomplete →
/// missing_instructions → missing_box` is walked until a tier with data is
/// found. No data at any tier yields the default minimum.
#[must_use]
pub fn select_price(
    item: &IdentifiedItem,
    points: &[PricePoint],
    default_minimum_usd: f64,
) -> ResolvedPrice {
    let preferred = item.condition.preferred_tier();

    if let Some(point) = best_point_at(points, preferred) {
        return ResolvedPrice {
            amount_usd: point.amount_usd,
            basis: PricingBasis::Exact(preferred),
            point: Some(point.clone()),
            all_points: points.to_vec(),
        };
    }

    for &tier in PriceTier::FALLBACK_CHAIN {
        if tier == preferred {
            continue;
        }
        if let Some(point) = best_point_at(points, tier) {
            return ResolvedPrice {
                amount_usd: point.amount_usd,
                basis: PricingBasis::Fallback(tier),
                point: Some(point.clone()),
                all_points: points.to_vec(),
            };
        }
    }

    ResolvedPrice {
        amount_usd: default_minimum_usd,
        basis: PricingBasis::DefaultMinimum,
        point: None,
        all_points: points.to_vec(),
    }
}

/// Deterministic tie-break within a tier: newest observation wins; equal
/// timestamps fall back to the lexicographically greatest source id.
fn best_point_at(points: &[PricePoint], tier: PriceTier) -> Option<&PricePoint> {
    points
        .iter()
        .filter(|p| p.tier == tier)
        .max_by(|a, b| {
            a.observed_at
                .cmp(&b.observed_at)
                .then_with(|| a.source.cmp(&b.source))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ItemCondition;
    use crate::error::BrickvalError;
    use chrono::{TimeZone, Utc};

    fn item(condition: ItemCondition) -> IdentifiedItem {
        IdentifiedItem {
            name: "sw0001a Luke Skywalker".to_string(),
            category: ItemCategory::Minifigure,
            condition,
            year: Some(1999),
            theme: Some("Star Wars".to_string()),
            confidence: 0.9,
        }
    }

    fn point(tier: PriceTier, amount: f64, source: &str, day: u32) -> PricePoint {
        PricePoint {
            tier,
            amount_usd: amount,
            source: source.to_string(),
            observed_at: Utc.with_ymd_and_hms(2026, 7, day, 12, 0, 0).unwrap(),
        }
    }

    struct StubMarket(Result<Vec<PricePoint>>);

    impl MarketplaceCollaborator for &StubMarket {
        async fn lookup_prices(
            &self,
            _category: ItemCategory,
            _search_key: &str,
        ) -> Result<Vec<PricePoint>> {
            match &self.0 {
                Ok(points) => Ok(points.clone()),
                Err(_) => Err(BrickvalError::Network("marketplace down".to_string())),
            }
        }
    }

    #[test]
    fn direct_condition_match_is_exact_basis() {
        let points = vec![
            point(PriceTier::UsedComplete, 42.0, "guide", 1),
            point(PriceTier::SealedNew, 80.0, "guide", 1),
        ];
        let resolved = select_price(&item(ItemCondition::UsedComplete), &points, 2.0);
        assert!((resolved.amount_usd - 42.0).abs() < f64::EPSILON);
        assert_eq!(resolved.basis, PricingBasis::Exact(PriceTier::UsedComplete));
    }

    #[test]
    fn fallback_chain_walks_in_fixed_order() {
        // Condition used_complete, no used_complete point. sealed_new comes
        // before msrp in the chain.
        let points = vec![
            point(PriceTier::Msrp, 30.0, "guide", 1),
            point(PriceTier::SealedNew, 75.0, "guide", 1),
        ];
        let resolved = select_price(&item(ItemCondition::UsedComplete), &points, 2.0);
        assert!((resolved.amount_usd - 75.0).abs() < f64::EPSILON);
        assert_eq!(resolved.basis, PricingBasis::Fallback(PriceTier::SealedNew));
    }

    #[test]
    fn last_chain_tier_is_reachable() {
        let points = vec![point(PriceTier::MissingBox, 12.0, "guide", 1)];
        let resolved = select_price(&item(ItemCondition::New), &points, 2.0);
        assert_eq!(resolved.basis, PricingBasis::Fallback(PriceTier::MissingBox));
    }

    #[test]
    fn no_data_yields_default_minimum() {
        let resolved = select_price(&item(ItemCondition::UsedComplete), &[], 2.5);
        assert!((resolved.amount_usd - 2.5).abs() < f64::EPSILON);
        assert_eq!(resolved.basis, PricingBasis::DefaultMinimum);
        assert!(resolved.point.is_none());
    }

    #[test]
    fn newest_observation_wins_within_a_tier() {
        let points = vec![
            point(PriceTier::UsedComplete, 40.0, "older", 1),
            point(PriceTier::UsedComplete, 44.0, "newer", 15),
        ];
        let resolved = select_price(&item(ItemCondition::UsedComplete), &points, 2.0);
        assert!((resolved.amount_usd - 44.0).abs() < f64::EPSILON);
        assert_eq!(resolved.point.unwrap().source, "newer");
    }

    #[test]
    fn equal_timestamps_break_ties_by_source() {
        let points = vec![
            point(PriceTier::UsedComplete, 40.0, "alpha", 1),
            point(PriceTier::UsedComplete, 44.0, "beta", 1),
        ];
        let resolved = select_price(&item(ItemCondition::UsedComplete), &points, 2.0);
        assert_eq!(resolved.point.unwrap().source, "beta");
    }

    #[test]
    fn search_key_prefers_embedded_catalog_number() {
        assert_eq!(search_key_for(&item(ItemCondition::New)), "sw0001a");

        let unnumbered = IdentifiedItem {
            name: "Classic Spaceman".to_string(),
            ..item(ItemCondition::New)
        };
        assert_eq!(search_key_for(&unnumbered), "Classic Spaceman");
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_default_minimum() {
        let market = StubMarket(Err(BrickvalError::Network("down".to_string())));
        let resolver = PriceResolver::new(&market, 3.0);
        let resolved = resolver.resolve(&item(ItemCondition::UsedComplete)).await;
        assert!((resolved.amount_usd - 3.0).abs() < f64::EPSILON);
        assert_eq!(resolved.basis, PricingBasis::DefaultMinimum);
    }
}
