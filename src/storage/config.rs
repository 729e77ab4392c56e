//! Configuration file loading and validation.
//!
//! Configuration is read from `config.toml` under the platform config
//! directory (override with `BRICKVAL_CONFIG` or `--config`). Every value
//! has a built-in default; an absent file is not an error, an unreadable or
//! invalid one is. Threshold ordering is validated at startup so that a
//! pipeline is never constructed from an invalid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::AppPaths;
use crate::core::budget::RateBudgetTracker;
use crate::core::scheduler::AdmissionScheduler;
use crate::core::valuation::ValuationPolicy;
use crate::error::{BrickvalError, Result};

/// Environment variable overriding the config file path.
pub const ENV_CONFIG: &str = "BRICKVAL_CONFIG";

// =============================================================================
// Config Sections
// =============================================================================

/// Valuation thresholds and pricing floors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationSection {
    /// USD total at or above which the lot is museum-grade.
    pub museum_threshold: f64,
    /// USD total at or above which the lot is worth reselling.
    pub rare_threshold: f64,
    /// Items older than this many years count as vintage.
    pub vintage_years_threshold: u32,
    /// Below-museum band width in which vintage bumps the category.
    pub vintage_margin_usd: f64,
    /// Floor value for items with no market data at any tier.
    pub default_minimum_item_value_usd: f64,
}

impl Default for ValuationSection {
    fn default() -> Self {
        Self {
            museum_threshold: 500.0,
            rare_threshold: 100.0,
            vintage_years_threshold: 20,
            vintage_margin_usd: 50.0,
            default_minimum_item_value_usd: 2.0,
        }
    }
}

/// Shared rate budgets for the metered vision service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSection {
    /// Token-volume units admitted per window.
    pub rate_budget_volume: u64,
    /// Request count admitted per window.
    pub rate_budget_requests: u64,
    /// Trailing window duration in seconds.
    pub window_duration_seconds: u64,
    /// Bound on how long one admission attempt may queue.
    pub admission_deadline_seconds: u64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            rate_budget_volume: 25_000,
            rate_budget_requests: 50,
            window_duration_seconds: 60,
            admission_deadline_seconds: 30,
        }
    }
}

impl BudgetSection {
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_duration_seconds)
    }

    #[must_use]
    pub const fn admission_deadline(&self) -> Duration {
        Duration::from_secs(self.admission_deadline_seconds)
    }

    /// Build the process-wide scheduler: one tracker for token volume, one
    /// for request count, in the cost-vector order the orchestrator uses.
    #[must_use]
    pub fn build_scheduler(&self) -> AdmissionScheduler {
        AdmissionScheduler::new(vec![
            RateBudgetTracker::new("tokens", self.rate_budget_volume, self.window()),
            RateBudgetTracker::new("requests", self.rate_budget_requests, self.window()),
        ])
    }
}

/// Exchange-rate caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencySection {
    /// Cache time-to-live in seconds.
    pub exchange_rate_ttl_seconds: u64,
    /// Rate used when no fetch ever succeeded.
    pub static_fallback_rate: f64,
}

impl Default for CurrencySection {
    fn default() -> Self {
        Self {
            exchange_rate_ttl_seconds: 3600,
            static_fallback_rate: 0.92,
        }
    }
}

impl CurrencySection {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.exchange_rate_ttl_seconds)
    }
}

// =============================================================================
// App Config
// =============================================================================

/// Root configuration structure for config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub valuation: ValuationSection,
    pub budget: BudgetSection,
    pub currency: CurrencySection,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Precedence for the file path: `--config` flag, then `BRICKVAL_CONFIG`,
    /// then the platform default. An explicitly named file must exist; the
    /// platform default may be absent, in which case built-in defaults apply.
    ///
    /// # Errors
    ///
    /// `ConfigNotFound` for a missing explicit path, `ConfigParse` for
    /// invalid TOML, `ConfigInvalid` for values failing validation.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit_path {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var(ENV_CONFIG) {
                Ok(p) if !p.trim().is_empty() => (PathBuf::from(p), true),
                _ => (AppPaths::resolve().config_file(), false),
            },
        };

        let config = if path.exists() {
            Self::parse_file(&path)?
        } else if required {
            return Err(BrickvalError::ConfigNotFound {
                path: path.display().to_string(),
            });
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| BrickvalError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| BrickvalError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the whole configuration. Violations are fatal at startup.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid` naming the offending key.
    pub fn validate(&self) -> Result<()> {
        self.policy().validate()?;

        if self.valuation.default_minimum_item_value_usd < 0.0 {
            return Err(BrickvalError::ConfigInvalid {
                key: "default_minimum_item_value_usd".to_string(),
                message: "must be non-negative".to_string(),
            });
        }
        if self.budget.rate_budget_volume == 0 {
            return Err(BrickvalError::ConfigInvalid {
                key: "rate_budget_volume".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.budget.rate_budget_requests == 0 {
            return Err(BrickvalError::ConfigInvalid {
                key: "rate_budget_requests".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.budget.window_duration_seconds == 0 {
            return Err(BrickvalError::ConfigInvalid {
                key: "window_duration_seconds".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.currency.static_fallback_rate <= 0.0 {
            return Err(BrickvalError::ConfigInvalid {
                key: "static_fallback_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// The valuation policy derived from this configuration.
    #[must_use]
    pub const fn policy(&self) -> ValuationPolicy {
        ValuationPolicy {
            museum_threshold: self.valuation.museum_threshold,
            rare_threshold: self.valuation.rare_threshold,
            vintage_years_threshold: self.valuation.vintage_years_threshold,
            vintage_margin_usd: self.valuation.vintage_margin_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.valuation.museum_threshold - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.budget.rate_budget_volume, 25_000);
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[valuation]\nmuseum_threshold = 800.0\n\n[budget]\nrate_budget_volume = 10000"
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert!((config.valuation.museum_threshold - 800.0).abs() < f64::EPSILON);
        assert!((config.valuation.rare_threshold - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.budget.rate_budget_volume, 10_000);
        assert_eq!(config.budget.rate_budget_requests, 50);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/brickval.toml")))
            .expect_err("explicit config path must exist");
        assert!(matches!(err, BrickvalError::ConfigNotFound { .. }));
    }

    #[test]
    fn inverted_thresholds_fail_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[valuation]\nmuseum_threshold = 50.0\nrare_threshold = 100.0"
        )
        .unwrap();

        let err = AppConfig::load(Some(file.path())).expect_err("inverted thresholds");
        assert!(matches!(err, BrickvalError::ConfigInvalid { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[[").unwrap();

        let err = AppConfig::load(Some(file.path())).expect_err("malformed TOML");
        assert!(matches!(err, BrickvalError::ConfigParse { .. }));
    }

    #[test]
    fn zero_budget_fails_validation() {
        let config = AppConfig {
            budget: BudgetSection {
                rate_budget_volume: 0,
                ..BudgetSection::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
