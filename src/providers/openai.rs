use super::{CompletionParams, CompletionProvider, Message};
use crate::config::SharedSettings;
use crate::core::error::NoteaiError;
use crate::providers::base_client::HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [Message],
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Chat completions against an OpenAI-compatible endpoint.
///
/// The key and base URL are read from the shared settings on every call, so
/// edits made while a session is open apply to its next request.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: HttpClient,
    settings: SharedSettings,
}

impl OpenAIProvider {
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            client: HttpClient::new(),
            settings,
        }
    }
}

/// Extracts the answer from a response body, whatever the status code.
fn parse_completion(status: reqwest::StatusCode, body: &str) -> Result<String, NoteaiError> {
    let parsed: ChatCompletionResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if status.is_success() => {
            return Err(NoteaiError::Api(format!("Malformed response: {}", e)));
        }
        Err(_) => {
            return Err(NoteaiError::Api(format!(
                "API returned error status: {}",
                status
            )));
        }
    };

    if let Some(error) = parsed.error {
        let message = error
            .message
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(NoteaiError::Api(format!("OpenAI API Error: {}", message)));
    }

    if !status.is_success() {
        return Err(NoteaiError::Api(format!(
            "API returned error status: {}",
            status
        )));
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| NoteaiError::Api("Malformed response: no choices in API response".to_string()))
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> Result<String, NoteaiError> {
        let settings = self.settings.snapshot();
        let api_key = settings
            .credential()
            .ok_or(NoteaiError::MissingCredential)?;

        let payload = ChatCompletionRequest {
            messages,
            model: &params.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        debug!(
            model = %params.model,
            max_tokens = params.max_tokens,
            messages = messages.len(),
            "Requesting completion"
        );

        let response = self
            .client
            .post_json(settings.base_url(), "chat/completions", api_key, &payload)
            .await?;
        let status = response.status();
        let body = response.text().await?;

        parse_completion(status, &body).inspect_err(|e| {
            warn!(status = %status, error = %e, "Completion failed");
        })
    }
}
