//! Shared fixtures and mock collaborators for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};

use brickval::core::currency::RateCollaborator;
use brickval::core::identify::{RawIdentification, RawIdentifiedItem, VisionCollaborator};
use brickval::core::models::{ImageDescriptor, ItemCategory, PricePoint, PriceTier};
use brickval::core::pricing::MarketplaceCollaborator;
use brickval::error::{BrickvalError, Result};

// =============================================================================
// Fixtures
// =============================================================================

/// A small JPEG-ish payload; its exact bytes are irrelevant to the mocks.
pub fn test_image() -> ImageDescriptor {
    ImageDescriptor::new("image/jpeg", vec![0xFF; 2048])
}

pub fn raw_item(name: &str, year: Option<i32>, confidence: f64) -> RawIdentifiedItem {
    RawIdentifiedItem {
        name: Some(name.to_string()),
        category: Some("minifigure".to_string()),
        condition: Some("used_complete".to_string()),
        year,
        theme: Some("Space".to_string()),
        confidence: Some(confidence),
    }
}

pub fn raw_identification(items: Vec<RawIdentifiedItem>) -> RawIdentification {
    RawIdentification {
        items,
        description: Some("a tabletop of assorted toys".to_string()),
        overall_confidence: Some(0.8),
    }
}

pub fn price_point(tier: PriceTier, amount: f64, source: &str) -> PricePoint {
    PricePoint {
        tier,
        amount_usd: amount,
        source: source.to_string(),
        observed_at: Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap(),
    }
}

// =============================================================================
// Mock Collaborators
// =============================================================================

/// Vision stub returning a scripted identification and counting calls.
pub struct StubVision {
    pub raw: RawIdentification,
    pub calls: AtomicUsize,
}

impl StubVision {
    pub fn new(raw: RawIdentification) -> Self {
        Self {
            raw,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionCollaborator for &StubVision {
    async fn identify_raw(&self, _image: &ImageDescriptor) -> Result<RawIdentification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw.clone())
    }
}

/// Vision stub that always fails upstream.
pub struct FailingVision;

impl VisionCollaborator for FailingVision {
    async fn identify_raw(&self, _image: &ImageDescriptor) -> Result<RawIdentification> {
        Err(BrickvalError::Network("vision endpoint 503".to_string()))
    }
}

/// Marketplace stub serving a fixed table of price points per search key.
/// Keys listed in `fail_keys` simulate a marketplace outage for that item.
#[derive(Default)]
pub struct TableMarketplace {
    pub points: HashMap<String, Vec<PricePoint>>,
    pub fail_keys: HashSet<String>,
}

impl TableMarketplace {
    pub fn with_entry(mut self, key: &str, points: Vec<PricePoint>) -> Self {
        self.points.insert(key.to_string(), points);
        self
    }

    pub fn failing_for(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }
}

impl MarketplaceCollaborator for &TableMarketplace {
    async fn lookup_prices(
        &self,
        _category: ItemCategory,
        search_key: &str,
    ) -> Result<Vec<PricePoint>> {
        if self.fail_keys.contains(search_key) {
            return Err(BrickvalError::Network(format!(
                "marketplace outage for {search_key}"
            )));
        }
        Ok(self.points.get(search_key).cloned().unwrap_or_default())
    }
}

/// Rate stub returning a fixed rate.
pub struct FixedRates(pub f64);

impl RateCollaborator for FixedRates {
    async fn fetch_rate(&self, _base: &str, _quote: &str) -> Result<f64> {
        Ok(self.0)
    }
}

/// Rate stub simulating an unreachable rate service.
pub struct DownRates;

impl RateCollaborator for DownRates {
    async fn fetch_rate(&self, _base: &str, _quote: &str) -> Result<f64> {
        Err(BrickvalError::CurrencyUnavailable {
            message: "rate service unreachable".to_string(),
        })
    }
}
