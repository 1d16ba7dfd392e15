//! Remote classifier client for OpenAI-compatible chat-completion APIs.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use markfold_shared::{ClassifierSettings, MarkfoldError, Result};

use crate::prompt::prompt_fingerprint;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Sends one classification request per call. Cheap to clone.
#[derive(Clone)]
pub struct ClassifierClient {
    client: Client,
}

impl ClassifierClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MarkfoldError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Ask the model for a category path for `title`.
    ///
    /// `prompt` is sent as the system message. The first choice's content is
    /// returned trimmed but otherwise unnormalized.
    #[instrument(skip_all, fields(model = settings.model(), prompt = %prompt_fingerprint(prompt)))]
    pub async fn classify(
        &self,
        title: &str,
        prompt: &str,
        settings: &ClassifierSettings,
    ) -> Result<String> {
        settings.validate()?;
        let api_key = settings.api_key.as_deref().unwrap_or_default();
        let base_url = settings
            .api_base_url
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');

        let user = format!("Bookmark to classify: \"{title}\"");
        let request = ChatRequest {
            model: settings.model(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{base_url}/chat/completions"))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| MarkfoldError::Network(format!("classifier request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarkfoldError::ClassificationHttp {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| MarkfoldError::parse(format!("invalid classifier response: {e}")))?;

        let category = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(MarkfoldError::ClassificationEmpty)?;

        debug!(%category, "classifier answered");
        Ok(category)
    }
}
