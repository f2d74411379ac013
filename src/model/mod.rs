//! Extraction model abstraction.
//!
//! Defines the [`ExtractionModel`] trait so the hosted model backends
//! (Anthropic Messages, OpenRouter chat completions) can be swapped via
//! configuration.

pub mod anthropic;
pub mod openrouter;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;
use tracing::{info, warn};

/// Media type of every quote document.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// The document handed to the model: a URL it fetches itself, or inline bytes.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Url(String),
    Inline { media_type: String, data: Vec<u8> },
}

impl DocumentSource {
    /// Base64 payload of an inline document.
    pub fn base64_data(&self) -> Option<String> {
        match self {
            DocumentSource::Inline { data, .. } => Some(BASE64.encode(data)),
            DocumentSource::Url(_) => None,
        }
    }
}

/// Sampling parameters shared by every backend.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text returned by the model plus its token usage.
#[derive(Debug, Clone)]
pub struct RawModelResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Errors from a model call.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Network failure reaching the service
    #[error("Model transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("Model API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode model response: {0}")]
    Decode(String),

    /// The response carried no textual content block
    #[error("Model returned no text content")]
    EmptyResponse {
        input_tokens: u32,
        output_tokens: u32,
    },
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ModelError::Decode(e.to_string())
        } else {
            ModelError::Transport(e.to_string())
        }
    }
}

/// Async trait implemented by each model backend.
#[async_trait::async_trait]
pub trait ExtractionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Send the document with the system instruction and return the raw text.
    async fn invoke(
        &self,
        system: &str,
        document: &DocumentSource,
    ) -> Result<RawModelResponse, ModelError>;
}

/// Known backend identifiers used for configuration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProviderKind {
    Anthropic,
    OpenRouter,
}

impl ModelProviderKind {
    /// Parse a configuration string into a provider kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }
}

/// Download a document so it can be sent inline.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
) -> Result<DocumentSource, ModelError> {
    info!("Downloading document for inline submission: {}", url);
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ModelError::Api { status, body });
    }
    let data = resp.bytes().await?.to_vec();
    Ok(DocumentSource::Inline {
        media_type: PDF_MEDIA_TYPE.to_string(),
        data,
    })
}

/// Record token usage; counters are logged, never persisted.
fn log_usage(provider: &str, input_tokens: u32, output_tokens: u32) {
    info!(provider, input_tokens, output_tokens, "Model usage");
}

/// Build the response from decoded text and usage, logging usage first.
pub(crate) fn finish_response(
    provider: &str,
    text: Option<String>,
    input_tokens: u32,
    output_tokens: u32,
) -> Result<RawModelResponse, ModelError> {
    log_usage(provider, input_tokens, output_tokens);
    match text {
        Some(text) if !text.trim().is_empty() => Ok(RawModelResponse {
            text,
            input_tokens,
            output_tokens,
        }),
        _ => {
            warn!("{}: response carried no text content", provider);
            Err(ModelError::EmptyResponse {
                input_tokens,
                output_tokens,
            })
        }
    }
}
