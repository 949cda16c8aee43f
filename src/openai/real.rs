use crate::openai::OpenAIClientTrait;
use anyhow::{anyhow, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse,
};
use async_openai::Client;
use async_trait::async_trait;
use std::sync::Arc;

// A real implementation of the OpenAI client
pub struct RealOpenAIClient {
    client: Client<OpenAIConfig>,
}

impl RealOpenAIClient {
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }
}

/// Builds a client when an API key is configured. The base URL is optional
/// so the same code talks to OpenAI or to a compatible gateway.
pub fn maybe_create_openai_client(
    api_key: Option<String>,
    api_base: Option<String>,
) -> Result<Arc<dyn OpenAIClientTrait>> {
    let api_key =
        api_key.ok_or_else(|| anyhow!("LLM API key not configured"))?;
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(api_base) = api_base {
        config = config.with_api_base(api_base);
    }
    Ok(Arc::new(RealOpenAIClient::new(Client::with_config(config))))
}

#[async_trait]
impl OpenAIClientTrait for RealOpenAIClient {
    async fn chat_completion(
        &self,
        model: String,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_yields_no_client() {
        assert!(maybe_create_openai_client(None, None).is_err());
    }

    #[test]
    fn key_and_base_yield_client() {
        let client = maybe_create_openai_client(
            Some("test-key".to_string()),
            Some("http://localhost:8080/v1".to_string()),
        );
        assert!(client.is_ok());
    }
}
