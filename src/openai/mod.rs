pub mod fake;
pub mod real;

use anyhow::{anyhow, Result};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionResponse,
};
use async_trait::async_trait;

/// What the client was asked, kept by the fake for assertions.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model_name: String,
    pub prompt: String,
}

/// A trait that abstracts the chat completion endpoint so the pipeline can
/// run against any OpenAI compatible service, or a fake in tests.
#[async_trait]
pub trait OpenAIClientTrait: Send + Sync {
    /// Sends `messages` to `model` and returns the raw completion.
    async fn chat_completion(
        &self,
        model: String,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error>;
}

/// Sends `prompt` as a single user message and returns the text of the
/// first choice. An empty or missing completion is an error.
pub async fn complete_prompt(
    client: &dyn OpenAIClientTrait,
    model: &str,
    prompt: &str,
) -> Result<String> {
    let user_message = ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| anyhow!("Failed to build user message: {}", e))?,
    );

    let response = client
        .chat_completion(model.to_string(), vec![user_message])
        .await?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("Model {} returned no content", model))
}
