//! Error taxonomy for the consultation stack.
//!
//! Each layer carries its own error enum. Per-capability failures are
//! recovered by the capability client and recorded in the report; errors
//! that reach a caller here are connection-level, configuration-level, or
//! orchestration-level faults.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the framed stdio transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The host child process could not be started.
    #[error("failed to spawn capability host '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed handshake or framing. Fatal to the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The byte stream to the host closed or broke mid-exchange.
    #[error("transport stream error: {0}")]
    Stream(String),

    /// The host signalled an application-level fault for one call.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// A bounded wait on the host expired.
    #[error("transport operation timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Whether this error is isolated to a single capability call, as
    /// opposed to poisoning the whole connection.
    pub fn is_per_call(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::Timeout(_))
    }
}

/// Errors raised by the chat-completion collaborator.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-level failure talking to the endpoint.
    #[error("chat completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("chat completion API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The response body did not have the expected choices/message shape.
    #[error("malformed chat completion response: {0}")]
    MalformedResponse(String),
}

/// Configuration errors. Fatal at startup, surfaced before any network
/// activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("failed to read env file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to establish the consultation connection. Per-capability faults
/// never surface here; they are recorded in the report's `failures`.
#[derive(Debug, Error)]
pub enum ConsultationError {
    #[error("could not reach capability host: {0}")]
    Transport(#[from] TransportError),
}

/// Top-level orchestration failures.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Consultation(#[from] ConsultationError),
}
