//! Error types for brickval.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into five main categories:
//! - **Admission**: the shared rate budget denied or timed out a request
//! - **Upstream**: the external vision or marketplace service failed
//! - **Currency**: exchange-rate retrieval failed (non-fatal, stale fallback)
//! - **Configuration**: config file parsing, validation, or missing values
//! - **Internal**: I/O, serialization, or unclassified issues
//!
//! Each error has a stable error code (e.g., `BVAL-R001`) for programmatic
//! handling. Degraded-but-recoverable conditions (missing market data, stale
//! exchange rates) are resolved inside the core and surfaced as markers on
//! the result, never as silent absorption.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BrickvalError>;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rate-budget admission issues (denied, deadline, oversized cost).
    Admission,
    /// External collaborator issues (vision, marketplace).
    Upstream,
    /// Exchange-rate issues.
    Currency,
    /// Configuration issues (parse errors, invalid values, missing files).
    Configuration,
    /// Internal errors (I/O, serialization, bugs).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Admission => "Admission error",
            Self::Upstream => "Upstream error",
            Self::Currency => "Currency error",
            Self::Configuration => "Configuration error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Configuration or input errors
    ConfigError = 2,
    /// Rate limited and retry window reported
    RateLimited = 3,
    /// Deadline or timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

// =============================================================================
// Main Error Type
// =============================================================================

/// Main error type for brickval operations.
///
/// Each variant has:
/// - A stable error code (e.g., `BVAL-R001`)
/// - A category for classification
/// - A retryable flag for caller-side retry logic
#[derive(Error, Debug)]
pub enum BrickvalError {
    // ==========================================================================
    // Admission errors (Category: Admission)
    // ==========================================================================
    /// The shared budget denied the request twice; caller may retry after the
    /// reported duration.
    #[error("rate limit exceeded; retry after {}s", retry_after.as_secs())]
    RateLimitExceeded { retry_after: Duration },

    /// Admission could not complete within the caller-supplied deadline.
    #[error("admission deadline of {}s exceeded while waiting for budget", deadline.as_secs())]
    AdmissionDeadline { deadline: Duration },

    /// The estimated cost can never fit the configured budget.
    #[error("estimated cost {cost} exceeds the whole {tracker} budget of {budget}")]
    CostExceedsBudget {
        tracker: &'static str,
        cost: u64,
        budget: u64,
    },

    // ==========================================================================
    // Upstream errors (Category: Upstream)
    // ==========================================================================
    /// The vision collaborator failed; surfaced without internal retry.
    #[error("vision identification failed: {message}")]
    UpstreamIdentification { message: String },

    /// No market data could be retrieved for an item.
    ///
    /// Resolved internally via the default-minimum fallback; only surfaces
    /// when constructed outside the resolution path.
    #[error("no market data for {search_key}")]
    MissingMarketData { search_key: String },

    /// Failed to parse a collaborator response.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    /// Network-level failure talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    // ==========================================================================
    // Currency errors (Category: Currency)
    // ==========================================================================
    /// Exchange-rate retrieval failed and no cached rate existed.
    #[error("exchange rate unavailable: {message}")]
    CurrencyUnavailable { message: String },

    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Configuration file not found at expected path.
    #[error("config file not found: {path}")]
    ConfigNotFound { path: String },

    /// Error parsing configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid { key: String, message: String },

    /// Could not read the input image.
    #[error("cannot read image {path}: {message}")]
    ImageRead { path: String, message: String },

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==========================================================================
    // Generic wrapper (Category: Internal)
    // ==========================================================================
    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BrickvalError {
    /// Map error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::RateLimitExceeded { .. } => ExitCode::RateLimited,

            Self::AdmissionDeadline { .. } | Self::Timeout(_) => ExitCode::Timeout,

            Self::CostExceedsBudget { .. }
            | Self::ConfigNotFound { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::ImageRead { .. } => ExitCode::ConfigError,

            Self::UpstreamIdentification { .. }
            | Self::MissingMarketData { .. }
            | Self::ParseResponse(_)
            | Self::Network(_)
            | Self::CurrencyUnavailable { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimitExceeded { .. }
            | Self::AdmissionDeadline { .. }
            | Self::CostExceedsBudget { .. } => ErrorCategory::Admission,

            Self::UpstreamIdentification { .. }
            | Self::MissingMarketData { .. }
            | Self::ParseResponse(_)
            | Self::Network(_)
            | Self::Timeout(_) => ErrorCategory::Upstream,

            Self::CurrencyUnavailable { .. } => ErrorCategory::Currency,

            Self::ConfigNotFound { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::ImageRead { .. } => ErrorCategory::Configuration,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `BVAL-{category}{number}` where category is:
    /// - R: Admission (rate budget)
    /// - U: Upstream
    /// - C: Currency
    /// - F: Configuration
    /// - X: Internal
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "BVAL-R001",
            Self::AdmissionDeadline { .. } => "BVAL-R002",
            Self::CostExceedsBudget { .. } => "BVAL-R003",

            Self::UpstreamIdentification { .. } => "BVAL-U001",
            Self::MissingMarketData { .. } => "BVAL-U002",
            Self::ParseResponse(_) => "BVAL-U003",
            Self::Network(_) => "BVAL-U004",
            Self::Timeout(_) => "BVAL-U005",

            Self::CurrencyUnavailable { .. } => "BVAL-C101",

            Self::ConfigNotFound { .. } => "BVAL-F001",
            Self::ConfigParse { .. } => "BVAL-F002",
            Self::ConfigInvalid { .. } => "BVAL-F003",
            Self::ImageRead { .. } => "BVAL-F004",

            Self::Io(_) => "BVAL-X001",
            Self::Json(_) => "BVAL-X002",
            Self::Other(_) => "BVAL-X099",
        }
    }

    /// Whether the caller may reasonably retry the whole operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded { .. }
                | Self::AdmissionDeadline { .. }
                | Self::Network(_)
                | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_admission_category() {
        let err = BrickvalError::RateLimitExceeded {
            retry_after: Duration::from_secs(58),
        };
        assert_eq!(err.category(), ErrorCategory::Admission);
        assert_eq!(err.error_code(), "BVAL-R001");
        assert_eq!(err.exit_code(), ExitCode::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn config_invalid_is_fatal_not_retryable() {
        let err = BrickvalError::ConfigInvalid {
            key: "museum_threshold".to_string(),
            message: "must exceed rare_threshold".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.exit_code(), ExitCode::ConfigError);
        assert!(!err.is_retryable());
    }

    #[test]
    fn upstream_failure_is_surfaced_not_retryable() {
        let err = BrickvalError::UpstreamIdentification {
            message: "503 from vision endpoint".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Upstream);
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_includes_retry_seconds() {
        let err = BrickvalError::RateLimitExceeded {
            retry_after: Duration::from_secs(58),
        };
        assert!(err.to_string().contains("58"));
    }
}
