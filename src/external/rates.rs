//! HTTP client for the exchange-rate service.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::core::currency::RateCollaborator;
use crate::error::{BrickvalError, Result};
use crate::external::map_request_error;

/// Environment variable overriding the rates base URL.
pub const ENV_RATES_URL: &str = "BRICKVAL_RATES_URL";

const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
}

/// Rate collaborator backed by a latest-rates endpoint.
pub struct ExchangeRateApiClient {
    client: Client,
    base_url: String,
}

impl ExchangeRateApiClient {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Build from environment variables; the endpoint needs no key.
    #[must_use]
    pub fn from_env(client: Client) -> Self {
        let base_url =
            std::env::var(ENV_RATES_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(client, base_url)
    }
}

impl RateCollaborator for ExchangeRateApiClient {
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<f64> {
        let response = self
            .client
            .get(format!("{}/latest", self.base_url))
            .query(&[("from", base), ("to", quote)])
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrickvalError::CurrencyUnavailable {
                message: format!("HTTP {status} from rate endpoint"),
            });
        }

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|e| BrickvalError::ParseResponse(e.to_string()))?;

        let rate = body
            .rates
            .get(quote)
            .copied()
            .ok_or_else(|| BrickvalError::CurrencyUnavailable {
                message: format!("{quote} missing from rate response"),
            })?;

        debug!(base, quote, rate, "exchange rate fetched");
        Ok(rate)
    }
}
