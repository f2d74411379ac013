//! OpenRouter chat-completions backend.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    finish_response, DocumentSource, ExtractionModel, ModelError, ModelParams, RawModelResponse,
};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Filename announced to the model for the attached quote.
const DOCUMENT_FILENAME: &str = "quote.pdf";

const USER_INSTRUCTION: &str = "Extract the hotel quote in the attached PDF.";

#[derive(Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    params: ModelParams,
}

impl OpenRouterClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, params: ModelParams) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            params,
        }
    }

    fn build_request(&self, system: &str, document: &DocumentSource) -> ChatCompletionRequest {
        let file_data = match document {
            DocumentSource::Url(url) => url.clone(),
            DocumentSource::Inline { media_type, .. } => format!(
                "data:{};base64,{}",
                media_type,
                document.base64_data().unwrap_or_default()
            ),
        };

        ChatCompletionRequest {
            model: self.params.model.clone(),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            messages: vec![
                Message {
                    role: Role::System,
                    content: MessageContent::Text(system.to_string()),
                },
                Message {
                    role: Role::User,
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_INSTRUCTION.to_string(),
                        },
                        ContentPart::File {
                            file: FilePart {
                                filename: DOCUMENT_FILENAME.to_string(),
                                file_data,
                            },
                        },
                    ]),
                },
            ],
        }
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: Role,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    File { file: FilePart },
}

#[derive(Debug, Serialize)]
struct FilePart {
    filename: String,
    file_data: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatCompletionResponse {
    fn into_raw(self, provider: &str) -> Result<RawModelResponse, ModelError> {
        let (input_tokens, output_tokens) = self
            .usage
            .as_ref()
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        finish_response(provider, text, input_tokens, output_tokens)
    }
}

#[async_trait::async_trait]
impl ExtractionModel for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn invoke(
        &self,
        system: &str,
        document: &DocumentSource,
    ) -> Result<RawModelResponse, ModelError> {
        let request = self.build_request(system, document);
        debug!("Sending request to OpenRouter: model={}", request.model);

        let resp = self
            .client
            .post(OPENROUTER_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        let body: ChatCompletionResponse = resp.json().await?;
        body.into_raw(self.name())
    }
}
