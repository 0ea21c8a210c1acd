//! Chat-completion collaborator interface.
//!
//! Everything that talks to a text-generation endpoint goes through the
//! [`ChatCompletions`] trait: the specialists hosted by the capability
//! host, and the decision orchestrator's two-turn loop. The concrete
//! HTTP client lives in [`azure`]; tests substitute scripted
//! implementations.

pub mod azure;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::LlmError;

pub use azure::AzureChatClient;

/// One function invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// The function name and raw JSON argument string of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text as emitted by the model. May be malformed; callers
    /// must parse defensively.
    pub arguments: String,
}

/// One message in a chat-completion conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn, with the tool calls the model requested (if any).
    pub fn assistant(content: Option<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool-response message answering one tool call.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// One chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    /// Tool schemas offered to the model, when tool use is on the table.
    pub tools: Option<Vec<Value>>,
    /// `"auto"` or a forced-choice object; `None` when no tool is offered.
    pub tool_choice: Option<Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.2,
            tools: None,
            tool_choice: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Value>, tool_choice: Value) -> Self {
        self.tools = Some(tools);
        self.tool_choice = Some(tool_choice);
        self
    }
}

/// The first choice's message from a chat-completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: ChatMessage,
}

impl ChatResponse {
    /// Extract the first choice's message from a raw response body.
    pub fn from_value(body: &Value) -> Result<Self, LlmError> {
        let message = body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .ok_or_else(|| {
                LlmError::MalformedResponse("no choices[0].message in response".to_string())
            })?;

        let message: ChatMessage = serde_json::from_value(message.clone())
            .map_err(|e| LlmError::MalformedResponse(format!("unparseable message: {e}")))?;
        Ok(Self { message })
    }

    /// Tool calls requested by the model, empty when none.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.message.tool_calls.as_deref().unwrap_or(&[])
    }

    /// Text content, empty when the model sent none.
    pub fn content(&self) -> &str {
        self.message.content.as_deref().unwrap_or("")
    }
}

/// A chat-completion collaborator.
#[async_trait]
pub trait ChatCompletions: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}
