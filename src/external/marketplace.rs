//! HTTP client for the marketplace price guide.
//!
//! One price-guide request per condition code (N for sealed, U for used),
//! mapped into tiered [`PricePoint`]s. An item the marketplace does not
//! know yields an empty point set, not an error; the resolver's fallback
//! chain handles the rest.

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::core::models::{ItemCategory, PricePoint, PriceTier};
use crate::core::pricing::MarketplaceCollaborator;
use crate::error::{BrickvalError, Result};
use crate::external::map_request_error;

/// Environment variable holding the marketplace API key.
pub const ENV_MARKETPLACE_API_KEY: &str = "BRICKVAL_MARKETPLACE_API_KEY";
/// Environment variable overriding the marketplace base URL.
pub const ENV_MARKETPLACE_URL: &str = "BRICKVAL_MARKETPLACE_URL";

const DEFAULT_BASE_URL: &str = "https://api.bricklink.com/api/store/v1";

/// Condition codes the price guide accepts, with their tier mapping.
const GUIDE_CONDITIONS: &[(&str, PriceTier)] =
    &[("N", PriceTier::SealedNew), ("U", PriceTier::UsedComplete)];

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct PriceGuideResponse {
    #[serde(default)]
    data: Option<PriceGuideData>,
}

#[derive(Debug, Deserialize)]
struct PriceGuideData {
    #[serde(default)]
    avg_price: Option<String>,
    #[serde(default)]
    times_sold: Option<u32>,
}

// =============================================================================
// Client
// =============================================================================

/// Marketplace collaborator backed by a store-API price guide.
pub struct MarketplaceApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MarketplaceApiClient {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Build from environment variables.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid` when the API key variable is unset.
    pub fn from_env(client: Client) -> Result<Self> {
        let api_key =
            std::env::var(ENV_MARKETPLACE_API_KEY).map_err(|_| BrickvalError::ConfigInvalid {
                key: ENV_MARKETPLACE_API_KEY.to_string(),
                message: "marketplace API key not set".to_string(),
            })?;
        let base_url =
            std::env::var(ENV_MARKETPLACE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(client, base_url, api_key))
    }

    async fn fetch_guide(
        &self,
        category: ItemCategory,
        search_key: &str,
        condition_code: &str,
        tier: PriceTier,
    ) -> Result<Option<PricePoint>> {
        let url = format!(
            "{}/items/{}/{}/price",
            self.base_url,
            category.marketplace_code(),
            search_key
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("guide_type", "stock"),
                ("new_or_used", condition_code),
                ("currency_code", "USD"),
            ])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Unknown item: no data at this tier, not a failure.
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BrickvalError::Network(format!(
                "HTTP {status} from price guide for {search_key}"
            )));
        }

        let body: PriceGuideResponse = response
            .json()
            .await
            .map_err(|e| BrickvalError::ParseResponse(e.to_string()))?;

        let Some(data) = body.data else {
            return Ok(None);
        };
        let Some(avg_price) = data.avg_price else {
            return Ok(None);
        };
        let amount_usd: f64 = avg_price
            .parse()
            .map_err(|_| BrickvalError::ParseResponse(format!("bad avg_price '{avg_price}'")))?;

        debug!(
            %search_key,
            condition_code,
            amount_usd,
            times_sold = data.times_sold.unwrap_or(0),
            "price guide entry"
        );

        Ok(Some(PricePoint {
            tier,
            amount_usd,
            source: format!("price-guide:{condition_code}"),
            observed_at: Utc::now(),
        }))
    }
}

impl MarketplaceCollaborator for MarketplaceApiClient {
    async fn lookup_prices(
        &self,
        category: ItemCategory,
        search_key: &str,
    ) -> Result<Vec<PricePoint>> {
        let mut points = Vec::with_capacity(GUIDE_CONDITIONS.len());
        for &(code, tier) in GUIDE_CONDITIONS {
            if let Some(point) = self.fetch_guide(category, search_key, code, tier).await? {
                points.push(point);
            }
        }
        Ok(points)
    }
}
