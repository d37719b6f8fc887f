use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ChatModel, LlmError};

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    total_duration: u64,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Local model served by Ollama's native chat API.
pub struct OllamaClient {
    client: Client,
    api_base: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(model: &str, api_base: &str) -> Self {
        let base = api_base.trim_end_matches('/').replace("/v1", "");

        Self {
            client: Client::new(),
            api_base: base,
            model: model.to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn send(
        &self,
        system_prompt: &str,
        user_input: &str,
        json_mode: bool,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.api_base);

        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user_input.to_string(),
                },
            ],
            stream: false,
            format: json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(LlmError::Api(format!("{} - {}", status, snippet)));
        }

        let resp: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let content = resp
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        info!(
            "Ollama: {} took {}ms, {} eval tokens",
            self.model,
            resp.total_duration / 1_000_000,
            resp.eval_count
        );

        Ok(content)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError> {
        self.send(system_prompt, user_input, false).await
    }

    async fn complete_json(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> Result<String, LlmError> {
        self.send(system_prompt, user_input, true).await
    }
}
