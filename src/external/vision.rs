//! HTTP client for the vision-identification service.
//!
//! Sends the photograph, base64-encoded, to a messages-style vision
//! endpoint together with an appraiser prompt, then extracts the JSON
//! object embedded in the model's text reply. Vision models routinely wrap
//! JSON in markdown fences or surround it with prose, so extraction strips
//! fences first and then takes the outermost brace pair.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::identify::{RawIdentification, VisionCollaborator};
use crate::core::models::ImageDescriptor;
use crate::error::{BrickvalError, Result};
use crate::external::map_request_error;

/// Environment variable holding the vision API key.
pub const ENV_VISION_API_KEY: &str = "BRICKVAL_VISION_API_KEY";
/// Environment variable overriding the vision endpoint base URL.
pub const ENV_VISION_URL: &str = "BRICKVAL_VISION_URL";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MAX_REPLY_TOKENS: u32 = 2_000;

const IDENTIFICATION_PROMPT: &str = "You are an expert toy appraiser with deep \
knowledge of building-brick minifigures, sets, and parts. Identify every item \
visible in the image. For each item report: name (with catalog number when \
known), category (minifigure, set, or part), condition (new, used_complete, \
or used_incomplete), year of release if identifiable, theme if known, and a \
confidence between 0 and 1. Reply with a single JSON object: \
{\"items\": [{\"name\", \"category\", \"condition\", \"year\", \"theme\", \
\"confidence\"}], \"description\": \"...\", \"overall_confidence\": 0.0}. \
Be honest about uncertainty; use null for unknown fields.";

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: String,
}

// =============================================================================
// Client
// =============================================================================

/// Vision collaborator backed by a messages-style HTTP API.
pub struct VisionApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl VisionApiClient {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Build from environment variables.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid` when the API key variable is unset.
    pub fn from_env(client: Client) -> Result<Self> {
        let api_key =
            std::env::var(ENV_VISION_API_KEY).map_err(|_| BrickvalError::ConfigInvalid {
                key: ENV_VISION_API_KEY.to_string(),
                message: "vision API key not set".to_string(),
            })?;
        let base_url =
            std::env::var(ENV_VISION_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(client, base_url, api_key))
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl VisionCollaborator for VisionApiClient {
    async fn identify_raw(&self, image: &ImageDescriptor) -> Result<RawIdentification> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_REPLY_TOKENS,
            system: IDENTIFICATION_PROMPT,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: &image.media_type,
                            data: BASE64.encode(&image.data),
                        },
                    },
                    ContentBlock::Text {
                        text: "Identify all toy items visible in this image.",
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrickvalError::Network(format!(
                "HTTP {status} from vision endpoint"
            )));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BrickvalError::ParseResponse(e.to_string()))?;

        let text = body
            .content
            .first()
            .map(|block| block.text.as_str())
            .unwrap_or_default();
        debug!(reply_len = text.len(), "vision reply received");

        parse_identification_reply(text)
    }
}

/// Extract the identification JSON from a model text reply.
///
/// # Errors
///
/// `ParseResponse` when no JSON object can be found or it fails to
/// deserialize.
pub fn parse_identification_reply(text: &str) -> Result<RawIdentification> {
    // Fences vary: ```json, ```JSON, or bare ```.
    static FENCE: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| Regex::new(r"```[a-zA-Z]*").expect("static pattern"));
    let stripped = FENCE.replace_all(text, "");

    let start = stripped.find('{');
    let end = stripped.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(BrickvalError::ParseResponse(
            "no JSON object in vision reply".to_string(),
        ));
    };
    if end < start {
        return Err(BrickvalError::ParseResponse(
            "malformed JSON object in vision reply".to_string(),
        ));
    }

    serde_json::from_str(&stripped[start..=end])
        .map_err(|e| BrickvalError::ParseResponse(e.to_string()))
}
