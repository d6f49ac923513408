//! LLM Client implementations
//!
//! Provides clients for OpenAI-compatible chat completion APIs (OpenRouter
//! by default) and Ollama. One request per call: no streaming, no retries.
//!
//! Author: hephaex@gmail.com

use async_trait::async_trait;
use medrag_core::{ChatMessage, LlmClient, LlmConfig, LlmProvider, RagError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    reasoning: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<Reasoning>,
}

#[derive(Debug, Serialize)]
struct Reasoning {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client against the OpenRouter API
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: LlmConfig::default().base_url,
            model: model.into(),
            reasoning: false,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                RagError::ConfigError(
                    "API key required: set OPENROUTER_API_KEY or OPENAI_API_KEY".to_string(),
                )
            })?;

        Ok(Self::new(api_key.clone(), config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_reasoning(config.reasoning))
    }

    /// Set custom base URL (for any OpenAI-compatible API)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Request provider-side reasoning
    pub fn with_reasoning(mut self, enabled: bool) -> Self {
        self.reasoning = enabled;
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            reasoning: self.reasoning.then_some(Reasoning { enabled: true }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::LlmError(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::LlmError(format!(
                "Completion API error ({status}): {error_text}"
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| RagError::LlmError(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| RagError::LlmError("No choices in completion response".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama chat API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.ollama_url.clone(), config.model.clone())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::LlmError(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::LlmError(format!("Ollama error: {error_text}")));
        }

        let result: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::LlmError(format!("Failed to parse Ollama response: {e}")))?;

        Ok(result.message.content.unwrap_or_default())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAI => Ok(Box::new(OpenAiClient::from_config(config)?)),
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    /// Serve `reply` on every POST to `path`, recording auth header and body
    async fn spawn_fake_api(path: &str, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let sink = captured.clone();

        let app = Router::new().route(
            path,
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                let reply = reply.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    sink.lock().unwrap().push((auth, body));
                    Json(reply)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn messages() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You are a helpful medical assistant."),
            ChatMessage::user("What is anemia?"),
        ]
    }

    #[tokio::test]
    async fn test_openai_sends_messages_and_returns_first_choice() {
        let (url, captured) = spawn_fake_api(
            "/chat/completions",
            json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "A lack of red blood cells." } },
                    { "message": { "role": "assistant", "content": "Second choice" } }
                ]
            }),
        )
        .await;

        let client = OpenAiClient::new("sk-test", "test-model")
            .with_base_url(format!("{url}/"))
            .with_reasoning(true);
        let answer = client.chat(&messages()).await.unwrap();
        assert_eq!(answer, "A lack of red blood cells.");

        let requests = captured.lock().unwrap();
        let (auth, body) = &requests[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "What is anemia?");
        assert_eq!(body["reasoning"]["enabled"], true);
    }

    #[tokio::test]
    async fn test_openai_without_reasoning_omits_field() {
        let (url, captured) = spawn_fake_api(
            "/chat/completions",
            json!({ "choices": [ { "message": { "content": "ok" } } ] }),
        )
        .await;

        let client = OpenAiClient::new("sk-test", "test-model").with_base_url(url);
        client.chat(&messages()).await.unwrap();

        let requests = captured.lock().unwrap();
        assert!(requests[0].1.get("reasoning").is_none());
    }

    #[tokio::test]
    async fn test_openai_empty_choices_is_error() {
        let (url, _) = spawn_fake_api("/chat/completions", json!({ "choices": [] })).await;

        let client = OpenAiClient::new("sk-test", "test-model").with_base_url(url);
        let err = client.chat(&messages()).await.unwrap_err();
        assert!(matches!(err, RagError::LlmError(_)));
    }

    #[tokio::test]
    async fn test_ollama_chat() {
        let (url, captured) = spawn_fake_api(
            "/api/chat",
            json!({ "message": { "role": "assistant", "content": "Iron helps." }, "done": true }),
        )
        .await;

        let client = OllamaClient::new(url, "llama3");
        assert_eq!(client.chat(&messages()).await.unwrap(), "Iron helps.");

        let requests = captured.lock().unwrap();
        assert_eq!(requests[0].1["stream"], false);
        assert_eq!(requests[0].1["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = LlmConfig::default();
        assert!(matches!(
            create_llm_client(&config),
            Err(RagError::ConfigError(_))
        ));

        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let client = create_llm_client(&config).unwrap();
        assert_eq!(client.model(), "nvidia/nemotron-3-nano-30b-a3b:free");
    }

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new("http://localhost:11434/", "llama3");
        assert_eq!(client.model(), "llama3");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
