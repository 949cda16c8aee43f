use anyhow::Result;
use async_openai::types::{
    ChatChoice, ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionResponseMessage,
    CompletionUsage, CreateChatCompletionResponse, FinishReason, Role,
};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::openai::{ModelRequest, OpenAIClientTrait};

/// A fake implementation of the OpenAI client for testing
///
/// Replies are queued with the builder methods and handed out in order;
/// once the queue is empty every call gets a default reply. Each call is
/// recorded in `requests` with the model and the user prompt text, so tests
/// can assert on how often the LLM was consulted and with what.
///
/// # Example
///
/// ```
/// use civic_digest::openai::complete_prompt;
/// use civic_digest::openai::fake::FakeOpenAIClient;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = FakeOpenAIClient::new().with_response("First response");
///     let text = complete_prompt(&client, "test-model", "Hello").await?;
///     assert_eq!(text, "First response");
///     assert_eq!(client.request_count(), 1);
///     Ok(())
/// }
/// ```
pub struct FakeOpenAIClient {
    responses: Mutex<Vec<Result<Option<String>, String>>>,
    // Track requests for verification in tests
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl Default for FakeOpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOpenAIClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
        }
    }

    /// Add a response to be returned by the fake client
    pub fn with_response(self, response: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Ok(Some(response.to_string())));
        self
    }

    /// Configure the client to return a response with None content
    pub fn with_none_content_response(self) -> Self {
        self.responses.lock().unwrap().push(Ok(None));
        self
    }

    /// Make the next call fail as if the service were down
    pub fn with_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Err(message.to_string()));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Prompt text of the most recent call, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|request| request.prompt.clone())
    }
}

fn user_prompt(messages: &[ChatCompletionRequestMessage]) -> String {
    messages
        .iter()
        .filter_map(|message| match message {
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(text),
                    ..
                },
            ) => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl OpenAIClientTrait for FakeOpenAIClient {
    #[allow(deprecated)]
    async fn chat_completion(
        &self,
        model: String,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error> {
        self.requests.lock().unwrap().push(ModelRequest {
            model_name: model.clone(),
            prompt: user_prompt(&messages),
        });

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Some("Fake default response".to_string()))
            } else {
                responses.remove(0)
            }
        };
        let content = next.map_err(|message| anyhow::anyhow!(message))?;

        let message = ChatCompletionResponseMessage {
            role: Role::Assistant,
            content,
            #[allow(deprecated)]
            function_call: None,
            tool_calls: None,
            #[allow(deprecated)]
            refusal: None,
            audio: None,
        };

        let chat_choice = ChatChoice {
            index: 0,
            message,
            finish_reason: Some(FinishReason::Stop),
            logprobs: None,
        };

        let usage = CompletionUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            prompt_tokens_details: None,
            completion_tokens_details: None,
        };

        Ok(CreateChatCompletionResponse {
            id: "fake_id".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model,
            system_fingerprint: Some("fake-fingerprint".to_string()),
            service_tier: None,
            choices: vec![chat_choice],
            usage: Some(usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::types::ChatCompletionRequestSystemMessageArgs;

    #[tokio::test]
    async fn replies_in_order_then_default() -> Result<(), anyhow::Error> {
        let client = FakeOpenAIClient::new()
            .with_response("First response")
            .with_response("Second response");

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content("You are helpful")
            .build()?;

        let first = client
            .chat_completion(
                "gpt-4".to_string(),
                vec![ChatCompletionRequestMessage::System(system_msg)],
            )
            .await?;
        assert_eq!(
            first.choices[0].message.content,
            Some("First response".to_string())
        );

        let second = client.chat_completion("gpt-4".to_string(), vec![]).await?;
        assert_eq!(
            second.choices[0].message.content,
            Some("Second response".to_string())
        );

        let third = client.chat_completion("gpt-4".to_string(), vec![]).await?;
        assert_eq!(
            third.choices[0].message.content,
            Some("Fake default response".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn scripted_errors_fail_the_call_and_are_recorded() {
        let client = FakeOpenAIClient::new().with_error("quota exceeded");
        let err = client
            .chat_completion("gpt-4".to_string(), vec![])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn system_messages_are_not_part_of_the_prompt() {
        let client = FakeOpenAIClient::new();
        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content("ignored")
            .build()
            .unwrap();
        client
            .chat_completion(
                "gpt-4".to_string(),
                vec![ChatCompletionRequestMessage::System(system_msg)],
            )
            .await
            .unwrap();
        assert_eq!(client.last_prompt().as_deref(), Some(""));
    }
}
