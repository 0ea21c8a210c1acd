//! Capability client.
//!
//! Drives one consultation cycle against a freshly spawned host: connect,
//! handshake, discover capabilities, invoke the resolved set sequentially
//! in discovery order, classify each reply, and assemble the report. One
//! capability's failure never aborts the consultation of the others.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::classify::{self, MAX_KEY_LINES};
use crate::errors::ConsultationError;
use crate::report::{ConsultationFailure, ConsultationReport, ConsultationResult};
use crate::transport::Connection;

/// Spawns a capability host and consults its specialists.
///
/// Each [`consult`](CapabilityClient::consult) call owns its own host
/// process for the duration of the cycle; nothing persists between calls.
pub struct CapabilityClient {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl CapabilityClient {
    /// Client for a host launched as `command args...`. The environment
    /// is inherited unless overridden with [`with_env`](Self::with_env).
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            timeout: None,
        }
    }

    /// Extra environment variables for the host process.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Override the per-request transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run one full consultation cycle.
    ///
    /// `wanted` narrows the invocation set; names that match nothing fall
    /// back to the full discovered set (a caller's preference never
    /// silently consults nothing).
    ///
    /// # Errors
    ///
    /// Only connection-phase failures (spawn, handshake, discovery)
    /// surface as `ConsultationError`; per-capability failures are
    /// recorded in the report's `failures`. A connection fault mid-cycle
    /// stops the loop: later capabilities stay unattempted, visible by
    /// comparing `attempted()` to `available_capabilities`.
    pub async fn consult(
        &self,
        task: &str,
        wanted: Option<&[String]>,
    ) -> Result<ConsultationReport, ConsultationError> {
        let mut conn = Connection::spawn(&self.command, &self.args, &self.env)?;
        if let Some(timeout) = self.timeout {
            conn = conn.with_timeout(timeout);
        }

        let report = consult_over(&mut conn, task, wanted).await;
        conn.close().await;
        report
    }
}

/// Consultation cycle over an already-established connection. Used by
/// [`CapabilityClient::consult`] and directly by in-process tests.
pub async fn consult_over(
    conn: &mut Connection,
    task: &str,
    wanted: Option<&[String]>,
) -> Result<ConsultationReport, ConsultationError> {
    conn.initialize().await?;

    let discovery = conn
        .request("list_capabilities", serde_json::json!({}))
        .await?;
    let available: Vec<String> = discovery["capabilities"]
        .as_array()
        .map(|caps| {
            caps.iter()
                .filter_map(|c| c["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    // Narrow to the requested subset; an empty intersection falls back to
    // the full roster.
    let to_consult: Vec<String> = match wanted {
        Some(names) if !names.is_empty() => {
            let matched: Vec<String> = available
                .iter()
                .filter(|name| names.contains(name))
                .cloned()
                .collect();
            if matched.is_empty() {
                available.clone()
            } else {
                matched
            }
        }
        _ => available.clone(),
    };

    log::info!(
        "consulting {} of {} capabilities",
        to_consult.len(),
        available.len()
    );

    let mut report = ConsultationReport {
        available_capabilities: available,
        results: Vec::new(),
        failures: Vec::new(),
    };

    for name in &to_consult {
        let params = serde_json::json!({
            "name": name,
            "arguments": {"task": task},
        });
        match conn.request("call_capability", params).await {
            Ok(result) => {
                let reply = extract_reply_text(&result);
                report.results.push(ConsultationResult {
                    capability_name: name.clone(),
                    risk_level: classify::risk_level(&reply),
                    key_lines: classify::key_lines(&reply, MAX_KEY_LINES),
                    raw_reply: reply,
                });
            }
            Err(e) => {
                log::warn!("capability '{name}' failed: {e}");
                report.failures.push(ConsultationFailure {
                    capability_name: name.clone(),
                    error_message: e.to_string(),
                });
                // A connection-level fault poisons everything that
                // follows; stop instead of timing out per capability.
                // Capabilities never reached appear in neither list.
                if !e.is_per_call() {
                    break;
                }
            }
        }
    }

    Ok(report)
}

/// Join the `{content: [{type: "text", text}]}` parts into one reply.
fn extract_reply_text(result: &Value) -> String {
    let parts: Vec<&str> = result["content"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["text"].as_str())
                .collect()
        })
        .unwrap_or_default();
    parts.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_reply_text_joins_parts() {
        let result = serde_json::json!({
            "content": [
                {"type": "text", "text": "RIESGO: ALTO"},
                {"type": "text", "text": "RECOMENDACIÓN: alerta"},
            ]
        });
        assert_eq!(
            extract_reply_text(&result),
            "RIESGO: ALTO\nRECOMENDACIÓN: alerta"
        );
    }

    #[test]
    fn test_extract_reply_text_missing_content() {
        assert_eq!(extract_reply_text(&serde_json::json!({})), "");
    }
}
