//! Implementation of the `appraise` command.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::cli::args::{AppraiseArgs, OutputFormat};
use crate::core::currency::CurrencyConverter;
use crate::core::identify::IdentificationOrchestrator;
use crate::core::models::ImageDescriptor;
use crate::core::pipeline::AppraisalPipeline;
use crate::core::pricing::PriceResolver;
use crate::core::valuation::ValuationAggregator;
use crate::error::{BrickvalError, Result};
use crate::external::{
    DEFAULT_TIMEOUT, ExchangeRateApiClient, MarketplaceApiClient, VisionApiClient, build_client,
};
use crate::render;
use crate::storage::AppConfig;

/// Run one appraisal end to end and print the result.
///
/// # Errors
///
/// Propagates configuration, admission, and identification failures;
/// pricing and currency problems degrade the result instead of failing.
pub async fn run(
    args: &AppraiseArgs,
    config: &AppConfig,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<()> {
    let image = read_image(&args.image, args.media_type.as_deref())?;
    info!(
        path = %args.image.display(),
        bytes = image.len(),
        media_type = %image.media_type,
        "appraising image"
    );

    let http = build_client(DEFAULT_TIMEOUT)?;
    let scheduler = Arc::new(config.budget.build_scheduler());

    let orchestrator = IdentificationOrchestrator::new(
        VisionApiClient::from_env(http.clone())?,
        scheduler,
        config.budget.admission_deadline(),
    );
    let resolver = PriceResolver::new(
        MarketplaceApiClient::from_env(http.clone())?,
        config.valuation.default_minimum_item_value_usd,
    );
    let aggregator = ValuationAggregator::new(
        config.policy(),
        CurrencyConverter::new(
            ExchangeRateApiClient::from_env(http),
            config.currency.ttl(),
            config.currency.static_fallback_rate,
        ),
    );

    let pipeline = AppraisalPipeline::new(orchestrator, resolver, aggregator);
    let result = pipeline.appraise(&image, Utc::now()).await?;

    match format {
        OutputFormat::Human => print!("{}", render::human::render_result(&result, no_color)),
        OutputFormat::Json => println!("{}", render::robot::render_result(&result, pretty)?),
    }
    Ok(())
}

/// Read the image file and attach its media type.
fn read_image(path: &Path, media_type_override: Option<&str>) -> Result<ImageDescriptor> {
    let data = std::fs::read(path).map_err(|e| BrickvalError::ImageRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let media_type = media_type_override.map_or_else(
        || media_type_from_extension(path).to_string(),
        ToString::to_string,
    );
    Ok(ImageDescriptor::new(media_type, data))
}

/// Media type from the file extension; jpeg is the assumption of last
/// resort, matching what cameras overwhelmingly produce.
fn media_type_from_extension(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
