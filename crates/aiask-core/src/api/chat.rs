//! Chat completion request.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::ServiceToken;
use crate::config::Config;

use super::{ApiClient, ApiError, AuthScheme};

/// Reply used when the completion carries no text
pub const NO_RESPONSE: &str = "No response";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// The fixed system instruction followed by `prompt`
    pub fn new(config: &Config, prompt: &str) -> Self {
        Self {
            model: config.model.clone(),
            messages: vec![
                ChatMessage::system(config.system_prompt.as_str()),
                ChatMessage::user(prompt),
            ],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, or [`NO_RESPONSE`] when the path is absent or empty
    pub fn answer(&self) -> String {
        self.choices
            .as_ref()
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .filter(|content| !content.is_empty())
            .unwrap_or(NO_RESPONSE)
            .to_string()
    }
}

/// Send `prompt` to the completion endpoint and return the reply text.
pub async fn ask(
    api: &ApiClient,
    config: &Config,
    prompt: &str,
    token: &ServiceToken,
) -> Result<String, ApiError> {
    let request = ChatRequest::new(config, prompt);
    debug!(model = %request.model, prompt_len = prompt.len(), "Sending chat completion");

    let response: ChatResponse = api
        .with_credential(AuthScheme::Bearer, token.as_str())
        .post_json(&config.endpoints.chat_completions_url, &request)
        .await?;

    let answer = response.answer();
    info!(answer_len = answer.len(), "Chat completion received");
    Ok(answer)
}
