//! Capability host.
//!
//! A long-running process exposing the specialist registry over the
//! framed stdio channel. The host answers exactly three methods:
//! `initialize`, `list_capabilities`, and `call_capability`. It is
//! stateless across calls — no session and no conversation memory is
//! retained between invocations.
//!
//! Stdout is the wire; all logging goes to stderr.

pub mod registry;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::transport::wire::{
    InitializeResult, Request, Response, ServerInfo, INVALID_PARAMS, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION, SPECIALIST_FAILURE,
};

pub use registry::{enterprise_bridge_roster, Specialist, SpecialistRegistry};

/// Arguments of a `call_capability` request.
#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: CallArguments,
}

#[derive(Debug, Default, Deserialize)]
struct CallArguments {
    #[serde(default)]
    task: String,
}

/// Serves the specialist registry over a framed byte stream.
pub struct CapabilityHost {
    name: String,
    registry: SpecialistRegistry,
}

impl CapabilityHost {
    pub fn new(name: impl Into<String>, registry: SpecialistRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }

    /// Serve requests until the peer closes the stream.
    ///
    /// Requests are handled sequentially: one line in, one line out.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut writer = writer;
        let mut line = String::new();

        log::info!(
            "capability host '{}' serving {} specialists",
            self.name,
            self.registry.len()
        );

        loop {
            line.clear();
            let read = reader.read_line(&mut line).await?;
            if read == 0 {
                log::info!("peer closed the stream, host '{}' stopping", self.name);
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(line.trim()).await;
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    /// Serve on the process's own stdin/stdout.
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    async fn handle_line(&self, line: &str) -> Response {
        let request: Request = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                log::warn!("unparseable request frame: {e}");
                return Response::failure(None, PARSE_ERROR, "Parse error");
            }
        };

        log::debug!("request id={} method={}", request.id, request.method);
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "list_capabilities" => self.handle_list(request.id),
            "call_capability" => self.handle_call(request.id, request.params).await,
            other => Response::failure(
                Some(request.id),
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        }
    }

    fn handle_initialize(&self, id: u64) -> Response {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Servidor que expone especialistas del Enterprise como capacidades.".to_string(),
            ),
        };
        match serde_json::to_value(result) {
            Ok(value) => Response::success(id, value),
            Err(e) => Response::failure(Some(id), PARSE_ERROR, e.to_string()),
        }
    }

    fn handle_list(&self, id: u64) -> Response {
        let capabilities = self.registry.capabilities();
        Response::success(id, serde_json::json!({ "capabilities": capabilities }))
    }

    async fn handle_call(&self, id: u64, params: Value) -> Response {
        let params: CallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return Response::failure(
                    Some(id),
                    INVALID_PARAMS,
                    format!("Invalid params: {e}"),
                )
            }
        };

        let specialist = match self.registry.get(&params.name) {
            Some(s) => s,
            None => {
                // Data-level sentinel, not a transport failure: callers
                // inspect reply content for this pattern.
                log::warn!("unknown capability requested: '{}'", params.name);
                return Response::success(
                    id,
                    text_content(format!("Capacidad desconocida: {}", params.name)),
                );
            }
        };

        match specialist.run(&params.arguments.task).await {
            Ok(reply) => Response::success(id, text_content(reply)),
            Err(e) => {
                log::error!("specialist '{}' failed: {e}", params.name);
                Response::failure(
                    Some(id),
                    SPECIALIST_FAILURE,
                    format!("specialist '{}' failed: {e}", params.name),
                )
            }
        }
    }
}

/// Wrap a reply as the wire's `{content: [{type: "text", text}]}` shape.
fn text_content(text: impl Into<String>) -> Value {
    serde_json::json!({
        "content": [{"type": "text", "text": text.into()}]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::errors::LlmError;
    use crate::llm::{ChatCompletions, ChatMessage, ChatRequest, ChatResponse};

    struct StubChat(&'static str);

    #[async_trait]
    impl ChatCompletions for StubChat {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                message: ChatMessage::assistant(Some(self.0.to_string()), None),
            })
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatCompletions for FailingChat {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            Err(LlmError::MalformedResponse("collaborator down".to_string()))
        }
    }

    fn host() -> CapabilityHost {
        let registry = SpecialistRegistry::new(vec![
            Specialist::new("A", "alpha", "i", Arc::new(StubChat("RIESGO: ALTO"))),
            Specialist::new("B", "beta", "i", Arc::new(FailingChat)),
        ]);
        CapabilityHost::new("Puente de pruebas", registry)
    }

    #[tokio::test]
    async fn test_initialize_reports_protocol_version() {
        let resp = host()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await;
        let result = resp.result.unwrap();
        assert_eq!(result["protocol_version"], PROTOCOL_VERSION);
        assert_eq!(result["server_info"]["name"], "Puente de pruebas");
    }

    #[tokio::test]
    async fn test_list_capabilities_in_order() {
        let resp = host()
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"list_capabilities"}"#)
            .await;
        let caps = resp.result.unwrap()["capabilities"].clone();
        assert_eq!(caps[0]["name"], "A");
        assert_eq!(caps[1]["name"], "B");
        assert_eq!(caps[0]["input_schema"]["required"][0], "task");
    }

    #[tokio::test]
    async fn test_call_capability_returns_text_content() {
        let resp = host()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":3,"method":"call_capability","params":{"name":"A","arguments":{"task":"evalúa"}}}"#,
            )
            .await;
        let content = resp.result.unwrap()["content"].clone();
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "RIESGO: ALTO");
    }

    #[tokio::test]
    async fn test_unknown_capability_is_data_level_sentinel() {
        let resp = host()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":4,"method":"call_capability","params":{"name":"Nadie","arguments":{"task":"x"}}}"#,
            )
            .await;
        assert!(resp.error.is_none());
        let text = resp.result.unwrap()["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(text, "Capacidad desconocida: Nadie");
    }

    #[tokio::test]
    async fn test_specialist_failure_is_remote_error() {
        let resp = host()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":5,"method":"call_capability","params":{"name":"B","arguments":{"task":"x"}}}"#,
            )
            .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, SPECIALIST_FAILURE);
        assert!(err.message.contains("B"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let resp = host()
            .handle_line(r#"{"jsonrpc":"2.0","id":6,"method":"shutdown"}"#)
            .await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
        assert_eq!(resp.id, Some(6));
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let resp = host().handle_line("{not json").await;
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
        assert_eq!(resp.id, None);
    }

    #[tokio::test]
    async fn test_missing_params() {
        let resp = host()
            .handle_line(r#"{"jsonrpc":"2.0","id":7,"method":"call_capability","params":{}}"#)
            .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }
}
