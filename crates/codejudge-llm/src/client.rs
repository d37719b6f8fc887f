use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

use crate::{ChatModel, LlmError};

fn llm_err(e: impl ToString) -> LlmError {
    LlmError::Request(e.to_string())
}

fn extract_content(response: CreateChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(LlmError::EmptyResponse)
}

/// OpenAI-compatible chat completions client.
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl LlmClient {
    pub fn new(model: &str, api_key: &str, api_base: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Self {
            client: Client::with_config(config),
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
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .temperature(self.temperature)
            .messages(vec![
                ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(system_prompt)
                        .build()
                        .map_err(llm_err)?,
                ),
                ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(user_input)
                        .build()
                        .map_err(llm_err)?,
                ),
            ]);
        if json_mode {
            args.response_format(ResponseFormat::JsonObject);
        }
        let request = args.build().map_err(llm_err)?;

        let response = self.client.chat().create(request).await.map_err(llm_err)?;
        let content = extract_content(response)?;

        debug!("LLM: {} returned {} bytes", self.model, content.len());
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
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
