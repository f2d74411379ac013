//! Anthropic Messages API backend.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    finish_response, DocumentSource, ExtractionModel, ModelError, ModelParams, RawModelResponse,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    params: ModelParams,
}

impl AnthropicClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, params: ModelParams) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            params,
        }
    }

    fn build_request<'a>(
        &'a self,
        system: &'a str,
        document: &'a DocumentSource,
    ) -> MessagesRequest<'a> {
        let source = match document {
            DocumentSource::Url(url) => DocumentBlockSource::Url { url },
            DocumentSource::Inline { media_type, .. } => DocumentBlockSource::Base64 {
                media_type,
                data: document.base64_data().unwrap_or_default(),
            },
        };

        MessagesRequest {
            model: &self.params.model,
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            system,
            messages: vec![UserMessage {
                role: "user",
                content: vec![RequestBlock::Document { source }],
            }],
        }
    }
}

// ── Messages API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: Vec<RequestBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock<'a> {
    Document { source: DocumentBlockSource<'a> },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DocumentBlockSource<'a> {
    Url { url: &'a str },
    Base64 { media_type: &'a str, data: String },
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    fn into_raw(self, provider: &str) -> Result<RawModelResponse, ModelError> {
        finish_response(
            provider,
            first_text(self.content),
            self.usage.input_tokens,
            self.usage.output_tokens,
        )
    }
}

/// Text of the first content block; any other block type there counts as empty.
fn first_text(content: Vec<ResponseBlock>) -> Option<String> {
    match content.into_iter().next() {
        Some(ResponseBlock::Text { text }) => Some(text),
        _ => None,
    }
}

#[async_trait::async_trait]
impl ExtractionModel for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn invoke(
        &self,
        system: &str,
        document: &DocumentSource,
    ) -> Result<RawModelResponse, ModelError> {
        let request = self.build_request(system, document);
        debug!(
            "Sending request to Anthropic: model={} max_tokens={} temperature={}",
            request.model, request.max_tokens, request.temperature
        );

        let resp = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        let body: MessagesResponse = resp.json().await?;
        let response = body.into_raw(self.name())?;
        debug!("Raw model response length: {} chars", response.text.len());

        Ok(response)
    }
}
