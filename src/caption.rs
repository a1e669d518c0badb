//! AI-generated titles and descriptions for uploaded images.

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No title generated";
pub const NO_DESCRIPTION: &str = "No description generated";
pub const NOT_AVAILABLE: &str = "N/A";

const CAPTION_PROMPT: &str = "Generate a title and a description for this image. \
Respond with strict JSON only, without Markdown, in exactly this shape: \
{\"title\": \"...\", \"description\": \"...\"}. \
The title must be 5 to 10 words. The description must be 2 to 3 sentences.";

/// Caption metadata stored next to each image as `<name>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    pub title: String,
    pub description: String,
}

impl Caption {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn placeholder() -> Self {
        Self::new(NO_TITLE, NO_DESCRIPTION)
    }

    pub fn not_available() -> Self {
        Self::new(NOT_AVAILABLE, NOT_AVAILABLE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionResult {
    Success(Caption),
    Unavailable { reason: String },
}

impl CaptionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptionResult::Success(_))
    }

    /// The caption to persist; failures become [`Caption::placeholder`].
    pub fn into_caption(self) -> Caption {
        match self {
            CaptionResult::Success(caption) => caption,
            CaptionResult::Unavailable { .. } => Caption::placeholder(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("no caption text in response")]
    MissingText,
    #[error("caption is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image: &[u8], mime_type: &str) -> CaptionResult;
}

/// Used when no API credential could be resolved at startup.
pub struct DisabledCaptioner;

#[async_trait::async_trait]
impl Captioner for DisabledCaptioner {
    async fn caption(&self, _image: &[u8], _mime_type: &str) -> CaptionResult {
        CaptionResult::Unavailable {
            reason: "captioning is disabled".to_string(),
        }
    }
}

pub struct GeminiCaptioner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiCaptioner {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CaptionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    async fn generate(&self, image: &[u8], mime_type: &str) -> Result<Caption, CaptionError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );

        let payload = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "text": CAPTION_PROMPT
                    },
                    {
                        "inline_data": {
                            "mime_type": mime_type,
                            "data": general_purpose::STANDARD.encode(image)
                        }
                    }
                ]
            }]
        });

        tracing::debug!(model = %self.model, bytes = image.len(), "📤 sending caption request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(CaptionError::Api {
                status,
                body: response_text.chars().take(500).collect(),
            });
        }

        let result: serde_json::Value = serde_json::from_str(&response_text)?;

        let text = result["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or(CaptionError::MissingText)?;

        parse_caption(text)
    }
}

#[async_trait::async_trait]
impl Captioner for GeminiCaptioner {
    async fn caption(&self, image: &[u8], mime_type: &str) -> CaptionResult {
        match self.generate(image, mime_type).await {
            Ok(caption) => {
                tracing::info!(title = %caption.title, "✅ caption generated");
                CaptionResult::Success(caption)
            }
            Err(e) => {
                tracing::warn!(error = %e, "caption generation failed");
                CaptionResult::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Parses a model reply into a [`Caption`], tolerating a Markdown code fence
/// around the JSON body.
pub fn parse_caption(text: &str) -> Result<Caption, CaptionError> {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    Ok(serde_json::from_str(body.trim())?)
}

/// MIME type of an image, sniffed from its leading bytes.
///
/// Anything that is not recognisably PNG, GIF or WebP is treated as JPEG.
pub fn sniff_mime_type(image: &[u8]) -> &'static str {
    match image::guess_format(image) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::WebP) => "image/webp",
        _ => "image/jpeg",
    }
}
