//! HTTP-backed implementations of the core's collaborator traits.
//!
//! The core only sees the traits ([`VisionCollaborator`],
//! [`MarketplaceCollaborator`], [`RateCollaborator`]); everything
//! service-specific (endpoints, auth headers, wire formats) lives here.
//!
//! [`VisionCollaborator`]: crate::core::identify::VisionCollaborator
//! [`MarketplaceCollaborator`]: crate::core::pricing::MarketplaceCollaborator
//! [`RateCollaborator`]: crate::core::currency::RateCollaborator

pub mod marketplace;
pub mod rates;
pub mod vision;

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::error::{BrickvalError, Result};

pub use marketplace::MarketplaceApiClient;
pub use rates::ExchangeRateApiClient;
pub use vision::VisionApiClient;

/// Default timeout for collaborator requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a configured HTTP client shared by the collaborator implementations.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("brickval/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BrickvalError::Network(e.to_string()))
}

/// Map a reqwest error into the crate taxonomy.
pub(crate) fn map_request_error(err: &reqwest::Error) -> BrickvalError {
    if err.is_timeout() {
        BrickvalError::Timeout(DEFAULT_TIMEOUT.as_secs())
    } else {
        BrickvalError::Network(err.to_string())
    }
}
