use crate::error::AssistantError;
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_trait::async_trait;

/// One-shot prompt in, completion text out
#[async_trait]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError>;
}

/// Create a client for the backend's OpenAI-compatible endpoint
pub fn create_client(api_base: &str, api_key: &str) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_base(format!("{}/openai", api_base.trim_end_matches('/')))
        .with_api_key(api_key.to_string());

    Client::with_config(openai_config)
}

pub struct ChatGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ChatGenerator {
    pub fn new(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            create_client(&config.api_base, &config.api_key),
            config.text_model.clone(),
        )
    }
}

#[async_trait]
impl TextGenerator for ChatGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        tracing::info!("Generating text with {}", self.model);

        let request = build_request(&self.model, prompt)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AssistantError::Network(format!("Text generation failed: {}", e)))?;

        let text = completion_text(response);

        tracing::info!("Generation complete: {} chars", text.chars().count());
        Ok(text)
    }
}

fn build_request(model: &str, prompt: &str) -> Result<CreateChatCompletionRequest, AssistantError> {
    let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
        .content(prompt)
        .build()
        .map_err(|e| AssistantError::Network(format!("Failed to build message: {}", e)))?
        .into();

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(vec![message])
        .build()
        .map_err(|e| AssistantError::Network(format!("Failed to build request: {}", e)))
}

/// First choice carrying text, or empty when the model returned none
fn completion_text(response: CreateChatCompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::config::Config as _;
    use serde_json::json;

    fn response(choices: serde_json::Value) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gemini-3-flash-preview",
            "choices": choices,
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_choices_give_empty_text() {
        assert_eq!(completion_text(response(json!([]))), "");
    }

    #[test]
    fn test_first_choice_with_content_wins() {
        let text = completion_text(response(json!([
            { "index": 0, "message": { "role": "assistant", "content": null }, "finish_reason": "stop" },
            { "index": 1, "message": { "role": "assistant", "content": "陌生来电要核实" }, "finish_reason": "stop" }
        ])));
        assert_eq!(text, "陌生来电要核实");
    }

    #[test]
    fn test_request_carries_prompt_as_user_message() {
        let request = build_request("gemini-3-flash-preview", "给我一个防诈骗提示").unwrap();
        let value = serde_json::to_value(request).unwrap();
        assert_eq!(value["model"], "gemini-3-flash-preview");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "给我一个防诈骗提示");
    }

    #[test]
    fn test_client_targets_compatible_endpoint() {
        let client = create_client("https://example.test/v1beta/", "k");
        assert_eq!(client.config().api_base(), "https://example.test/v1beta/openai");
    }
}
