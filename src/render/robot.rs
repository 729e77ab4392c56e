//! Machine-readable (JSON) rendering of appraisal results.

use crate::core::models::ValuationResult;
use crate::error::Result;

/// Serialize a result as JSON, optionally pretty-printed.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn render_result(result: &ValuationResult, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    Ok(text)
}
