mod client;
mod fences;
mod ollama;

use std::sync::Arc;

use async_trait::async_trait;
use codejudge_core::{ExecutionError, LlmConfig, LlmProvider};
use thiserror::Error;

pub use client::LlmClient;
pub use fences::strip_code_fences;
pub use ollama::OllamaClient;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("No response content")]
    EmptyResponse,
}

/// A single system + user turn against some hosted or local model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, system_prompt: &str, user_input: &str) -> Result<String, LlmError>;

    /// Same turn with the backend's JSON output mode switched on. The reply
    /// is a JSON object as text.
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_input: &str,
    ) -> Result<String, LlmError>;
}

/// Builds the configured backend for one model name.
pub fn build_chat_model(
    config: &LlmConfig,
    model: &str,
) -> Result<Arc<dyn ChatModel>, ExecutionError> {
    match config.provider {
        LlmProvider::OpenAi => {
            let key = config
                .api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| ExecutionError::Config("OPENAI_API_KEY is not configured".into()))?;
            let client = LlmClient::new(model, key, config.api_base.as_deref())
                .with_temperature(config.temperature);
            Ok(Arc::new(client))
        }
        LlmProvider::Ollama => {
            let base = config.api_base.as_deref().ok_or_else(|| {
                ExecutionError::Config("LLM_API_BASE is required for the ollama provider".into())
            })?;
            Ok(Arc::new(
                OllamaClient::new(model, base).with_temperature(config.temperature),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_without_key_is_config_error() {
        let config = LlmConfig::default();
        assert!(matches!(
            build_chat_model(&config, "gpt-4o-mini"),
            Err(ExecutionError::Config(_))
        ));
    }

    #[test]
    fn test_builds_named_model() {
        let config = LlmConfig {
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        let model = build_chat_model(&config, "gpt-4o").unwrap();
        assert_eq!(model.model_name(), "gpt-4o");

        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            api_base: Some("http://localhost:11434".into()),
            ..LlmConfig::default()
        };
        let model = build_chat_model(&config, "qwen2.5-coder").unwrap();
        assert_eq!(model.model_name(), "qwen2.5-coder");
    }
}
