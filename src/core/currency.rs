//! USD→EUR conversion with a cached, TTL-bounded exchange rate.
//!
//! One process-wide cache, read-mostly. On expiry the rate is refreshed
//! from the external collaborator; on refresh failure the last cached rate
//! (or, lacking one, the configured static fallback) is used and the
//! conversion is flagged stale so downstream reporting can disclose rate
//! provenance.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::Result;

/// Base currency of every marketplace figure.
pub const BASE_CURRENCY: &str = "USD";

/// Secondary currency reported alongside USD.
pub const QUOTE_CURRENCY: &str = "EUR";

// =============================================================================
// Collaborator Contract
// =============================================================================

/// The external exchange-rate source, as the core sees it.
pub trait RateCollaborator: Send + Sync {
    fn fetch_rate(&self, base: &str, quote: &str) -> impl Future<Output = Result<f64>> + Send;
}

// =============================================================================
// Cache
// =============================================================================

/// A cached exchange rate and when it was fetched.
#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

/// One conversion outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub amount: f64,

    /// The rate that was applied.
    pub rate: f64,

    /// True when the rate came from an expired cache entry or the static
    /// fallback rather than a fresh fetch.
    pub stale: bool,
}

// =============================================================================
// Currency Converter
// =============================================================================

/// Converts USD figures to the secondary currency via a TTL-cached rate.
pub struct CurrencyConverter<R> {
    rates: R,
    cache: RwLock<Option<CachedRate>>,
    ttl: Duration,
    static_fallback_rate: f64,
}

impl<R: RateCollaborator> CurrencyConverter<R> {
    #[must_use]
    pub fn new(rates: R, ttl: Duration, static_fallback_rate: f64) -> Self {
        Self {
            rates,
            cache: RwLock::new(None),
            ttl,
            static_fallback_rate,
        }
    }

    /// Convert a USD amount to the secondary currency.
    pub async fn to_secondary(&self, amount_usd: f64) -> Conversion {
        let (rate, stale) = self.current_rate().await;
        Conversion {
            amount: amount_usd * rate,
            rate,
            stale,
        }
    }

    /// The rate that would be applied right now, with its staleness.
    ///
    /// Fresh cache entries are served without touching the collaborator.
    /// Expired (or absent) entries trigger a refresh; a failed refresh
    /// falls back to the last cached rate when present, else the static
    /// fallback, both marked stale.
    pub async fn current_rate(&self) -> (f64, bool) {
        let now = Instant::now();

        let cached = *self.read_cache();
        if let Some(entry) = cached {
            if now.saturating_duration_since(entry.fetched_at) <= self.ttl {
                return (entry.rate, false);
            }
        }

        match self.rates.fetch_rate(BASE_CURRENCY, QUOTE_CURRENCY).await {
            Ok(rate) => {
                debug!(rate, "exchange rate refreshed");
                *self.write_cache() = Some(CachedRate {
                    rate,
                    fetched_at: now,
                });
                (rate, false)
            }
            Err(err) => {
                if let Some(entry) = cached {
                    warn!(error = %err, rate = entry.rate, "rate refresh failed, reusing expired cache entry");
                    (entry.rate, true)
                } else {
                    warn!(error = %err, rate = self.static_fallback_rate, "rate refresh failed, using static fallback");
                    (self.static_fallback_rate, true)
                }
            }
        }
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, Option<CachedRate>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, Option<CachedRate>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}
