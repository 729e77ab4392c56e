//! Human-readable terminal rendering of appraisal results.

use colored::Colorize;

use crate::core::models::{PricingBasis, Recommendation, ValuationResult};

/// Render a full appraisal result for the terminal.
///
/// Rounding happens here and only here; the result itself carries exact
/// sums.
#[must_use]
pub fn render_result(result: &ValuationResult, no_color: bool) -> String {
    if no_color {
        colored::control::set_override(false);
    }

    let mut out = String::new();

    let header = format!(
        "Estimated value: ${:.2} (€{:.2})",
        result.total_usd, result.total_eur
    );
    out.push_str(&format!("{}\n", header.bold()));

    out.push_str(&format!(
        "Confidence: {:.0}%\n",
        result.overall_confidence * 100.0
    ));

    let recommendation = match result.recommendation {
        Recommendation::Museum => "museum".magenta().bold(),
        Recommendation::Resale => "resale".green().bold(),
        Recommendation::Collection => "collection".cyan().bold(),
    };
    out.push_str(&format!("Recommendation: {recommendation}\n"));

    let platforms: Vec<String> = result
        .suggested_platforms
        .iter()
        .map(ToString::to_string)
        .collect();
    out.push_str(&format!("Suggested platforms: {}\n", platforms.join(", ")));

    if result.rate_stale {
        out.push_str(&format!(
            "{}\n",
            format!(
                "note: EUR figures use a stale exchange rate ({:.4})",
                result.exchange_rate
            )
            .yellow()
        ));
    }

    if !result.items.is_empty() {
        out.push('\n');
        out.push_str(&format!("{}\n", "Items".underline()));
        for valuation in &result.items {
            let marker = match valuation.pricing_basis {
                PricingBasis::Exact(_) => String::new(),
                PricingBasis::Fallback(tier) => format!(" [priced via {tier}]").yellow().to_string(),
                PricingBasis::DefaultMinimum => " [default minimum]".red().to_string(),
            };
            out.push_str(&format!(
                "  {} - ${:.2} ({:.0}%){}\n",
                valuation.item.name,
                valuation.resolved_amount_usd,
                valuation.item_confidence * 100.0,
                marker
            ));
        }
    }

    if !result.description.is_empty() {
        out.push('\n');
        out.push_str(&format!("{}\n", result.description.dimmed()));
    }

    if no_color {
        colored::control::unset_override();
    }
    out
}
