use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agora_types::api::ChatTurn;

const TEMPERATURE: f32 = 0.7;

/// Thin client for an OpenAI-compatible chat-completion endpoint.
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatTurn,
}

impl CompletionClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    /// Forward the conversation and return the assistant's reply plus the
    /// provider's usage accounting, if any.
    pub async fn chat(&self, messages: &[ChatTurn]) -> Result<(ChatTurn, Option<Value>)> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: TEMPERATURE,
            })
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()
            .context("completion API returned an error status")?;

        let body: CompletionResponse = response
            .json()
            .await
            .context("invalid completion API response")?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("completion response contained no choices"))?;

        Ok((choice.message, body.usage))
    }
}
