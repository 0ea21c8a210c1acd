//! Azure OpenAI chat-completion client.
//!
//! Supports both endpoint shapes the platform exposes:
//!
//! - OpenAI-compatible: base URL ending in `/openai/v1` →
//!   `<base>/chat/completions`, and the payload must carry a `model` field.
//! - Deployment-style: any other base URL →
//!   `<base>/openai/deployments/<deployment>/chat/completions?api-version=<v>`,
//!   no `model` field required.
//!
//! Authentication is the `api-key` header in both shapes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Settings;
use crate::errors::LlmError;
use crate::llm::{ChatCompletions, ChatRequest, ChatResponse};

/// Bound on one chat-completion call.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completion client for an Azure OpenAI (or OpenAI-compatible)
/// endpoint.
#[derive(Debug, Clone)]
pub struct AzureChatClient {
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl AzureChatClient {
    /// Build a client from loaded settings.
    ///
    /// The underlying HTTP client carries the contractual 120s timeout.
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(CHAT_TIMEOUT).build()?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            deployment: settings.deployment.clone(),
            api_version: settings.api_version.clone(),
            max_retries: 2,
            http,
        })
    }

    /// Resolve the chat-completions URL and whether the payload needs a
    /// `model` field.
    fn api_url(&self) -> (String, bool) {
        let base = self.endpoint.trim_end_matches('/');
        if base.ends_with("/openai/v1") {
            (format!("{base}/chat/completions"), true)
        } else {
            (
                format!(
                    "{base}/openai/deployments/{}/chat/completions?api-version={}",
                    self.deployment, self.api_version
                ),
                false,
            )
        }
    }

    fn build_body(&self, request: &ChatRequest, needs_model: bool) -> Value {
        let mut body = serde_json::json!({
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if needs_model {
            body["model"] = Value::String(self.deployment.clone());
        }
        if let Some(ref tools) = request.tools {
            body["tools"] = Value::Array(tools.clone());
        }
        if let Some(ref choice) = request.tool_choice {
            body["tool_choice"] = choice.clone();
        }
        body
    }
}

#[async_trait]
impl ChatCompletions for AzureChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let (url, needs_model) = self.api_url();
        let body = self.build_body(&request, needs_model);

        log::debug!(
            "chat completion: deployment={}, messages={}, tools={}",
            self.deployment,
            request.messages.len(),
            request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
        );

        // Retry on rate limits and server errors with doubling backoff.
        let mut last_error: Option<LlmError> = None;
        let mut retry_delay = Duration::from_secs(1);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                log::warn!("chat completion retry {} after {:?}", attempt, retry_delay);
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let response = match self
                .http
                .post(&url)
                .header("api-key", self.api_key.as_str())
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(LlmError::Api { status, body });
                continue;
            }

            let text = match response.text().await {
                Ok(t) => t,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            if status.is_client_error() {
                return Err(LlmError::Api { status, body: text });
            }

            let json: Value = serde_json::from_str(&text)
                .map_err(|e| LlmError::MalformedResponse(format!("invalid JSON body: {e}")))?;
            return ChatResponse::from_value(&json);
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::MalformedResponse("chat completion produced no response".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> AzureChatClient {
        AzureChatClient::new(&Settings {
            endpoint: endpoint.to_string(),
            api_key: "k".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-15-preview".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_api_url_openai_v1_shape() {
        let (url, needs_model) = client("https://res.example.com/openai/v1/").api_url();
        assert_eq!(url, "https://res.example.com/openai/v1/chat/completions");
        assert!(needs_model);
    }

    #[test]
    fn test_api_url_deployment_shape() {
        let (url, needs_model) = client("https://res.openai.azure.com").api_url();
        assert_eq!(
            url,
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
        assert!(!needs_model);
    }

    #[test]
    fn test_body_model_field_only_for_openai_v1() {
        let c = client("https://res.example.com/openai/v1");
        let req = ChatRequest::new(vec![crate::llm::ChatMessage::user("hola")]);
        let with_model = c.build_body(&req, true);
        assert_eq!(with_model["model"], "gpt-4o");
        let without_model = c.build_body(&req, false);
        assert!(without_model.get("model").is_none());
    }

    #[test]
    fn test_body_carries_tools_and_choice() {
        let c = client("https://res.openai.azure.com");
        let req = ChatRequest::new(vec![crate::llm::ChatMessage::user("hola")])
            .with_tools(vec![serde_json::json!({"type": "function"})], "auto".into());
        let body = c.build_body(&req, false);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
        assert_eq!(body["temperature"], 0.2);
    }
}
