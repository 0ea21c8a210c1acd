//! Framed stdio transport for capability hosts.
//!
//! A [`Connection`] owns one host child process and its stdin/stdout pipes
//! for its lifetime. Requests and responses are JSON-RPC 2.0 objects, one
//! per line; the connection serializes request/response pairing internally
//! (it holds `&mut self` across a full exchange), so frames never
//! interleave. Every wait on the host is bounded by a timeout.

pub mod wire;

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use crate::errors::TransportError;
use wire::{InitializeResult, Request, Response, ServerInfo, PROTOCOL_VERSION};

/// Default bound on each request/response exchange.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type BoxedReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One live channel to a capability host.
///
/// Created either by spawning the host as a child process
/// ([`Connection::spawn`]) or over an existing stream pair
/// ([`Connection::over_streams`], used by tests to drive the protocol
/// without a process).
pub struct Connection {
    reader: BoxedReader,
    writer: BoxedWriter,
    child: Option<Child>,
    next_id: u64,
    timeout: Duration,
    closed: bool,
}

impl Connection {
    /// Start the host as a child process and take ownership of its pipes.
    ///
    /// The child's stderr is inherited; its stdout is the wire and must
    /// carry nothing but framed messages.
    ///
    /// # Errors
    ///
    /// `TransportError::Spawn` if the executable cannot be started.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, TransportError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| TransportError::Spawn {
            command: command.to_string(),
            source: e,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| TransportError::Stream(
            "child stdin not captured".to_string(),
        ))?;
        let stdout = child.stdout.take().ok_or_else(|| TransportError::Stream(
            "child stdout not captured".to_string(),
        ))?;

        log::info!("capability host spawned: {} {}", command, args.join(" "));

        Ok(Self {
            reader: BufReader::new(Box::new(stdout) as Box<dyn AsyncRead + Send + Unpin>),
            writer: Box::new(stdin),
            child: Some(child),
            next_id: 0,
            timeout: REQUEST_TIMEOUT,
            closed: false,
        })
    }

    /// Build a connection over an arbitrary stream pair. No child process
    /// is owned; `close()` only shuts the writer down.
    pub fn over_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: BufReader::new(Box::new(reader) as Box<dyn AsyncRead + Send + Unpin>),
            writer: Box::new(writer),
            child: None,
            next_id: 0,
            timeout: REQUEST_TIMEOUT,
            closed: false,
        }
    }

    /// Override the per-exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Perform the capability-negotiation handshake.
    ///
    /// # Errors
    ///
    /// `TransportError::Protocol` on a malformed handshake result or a
    /// protocol version the client does not speak.
    pub async fn initialize(&mut self) -> Result<ServerInfo, TransportError> {
        let params = serde_json::json!({
            "protocol_version": PROTOCOL_VERSION,
            "client_info": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self.request("initialize", params).await?;

        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| TransportError::Protocol(format!("malformed initialize result: {e}")))?;

        if init.protocol_version != PROTOCOL_VERSION {
            return Err(TransportError::Protocol(format!(
                "unsupported protocol version '{}' (expected '{}')",
                init.protocol_version, PROTOCOL_VERSION
            )));
        }

        log::debug!(
            "handshake complete: server='{}' v{}",
            init.server_info.name,
            init.server_info.version
        );
        Ok(init.server_info)
    }

    /// Send one framed request and await the matching framed response.
    ///
    /// # Errors
    ///
    /// * `TransportError::Stream` when the pipe closes or breaks.
    /// * `TransportError::Remote` when the host signals an application
    ///   fault for this call.
    /// * `TransportError::Timeout` when the bounded wait expires.
    /// * `TransportError::Protocol` when the response id does not match.
    pub async fn request(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        if self.closed {
            return Err(TransportError::Stream("connection closed".to_string()));
        }

        self.next_id += 1;
        let id = self.next_id;
        let request = Request::new(id, method, params);

        let timeout = self.timeout;
        let exchange = async {
            self.send(&request).await?;
            self.recv().await
        };
        let response = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        if response.id != Some(id) {
            return Err(TransportError::Protocol(format!(
                "response id {:?} does not match request id {}",
                response.id, id
            )));
        }

        if let Some(err) = response.error {
            return Err(TransportError::Remote {
                code: err.code,
                message: err.message,
            });
        }

        response.result.ok_or_else(|| {
            TransportError::Protocol("response carries neither result nor error".to_string())
        })
    }

    /// Terminate the child process (if any) and release the stream.
    /// Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let _ = self.writer.shutdown().await;
        if let Some(ref mut child) = self.child {
            let _ = child.kill().await;
        }
        self.child = None;
        log::debug!("transport closed");
    }

    async fn send(&mut self, request: &Request) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| TransportError::Protocol(format!("unserializable request: {e}")))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::Stream(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TransportError::Stream(format!("flush failed: {e}")))
    }

    async fn recv(&mut self) -> Result<Response, TransportError> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| TransportError::Stream(format!("read failed: {e}")))?;
            if read == 0 {
                return Err(TransportError::Stream(
                    "host closed the stream".to_string(),
                ));
            }
            if !line.trim().is_empty() {
                break;
            }
        }

        serde_json::from_str(line.trim())
            .map_err(|e| TransportError::Protocol(format!("malformed response frame: {e}")))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(ref mut child) = self.child {
            // Best-effort kill; close() is the graceful path.
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let result = Connection::spawn(
            "starbridge-host-that-does-not-exist",
            &[],
            &HashMap::new(),
        );
        match result {
            Err(TransportError::Spawn { command, .. }) => {
                assert!(command.contains("does-not-exist"));
            }
            other => panic!("expected SpawnError, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_request_after_close_is_stream_error() {
        let (a, _b) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(a);
        let mut conn = Connection::over_streams(read, write);
        conn.close().await;
        conn.close().await; // idempotent

        let err = conn
            .request("list_capabilities", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Stream(_)));
    }

    #[tokio::test]
    async fn test_request_times_out_on_silent_peer() {
        let (a, b) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(a);
        let mut conn =
            Connection::over_streams(read, write).with_timeout(Duration::from_millis(50));

        // Peer never answers.
        let err = conn
            .request("list_capabilities", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        drop(b);
    }

    #[tokio::test]
    async fn test_initialize_rejects_version_mismatch() {
        let (a, b) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(a);
        let (mut peer_read, mut peer_write) = tokio::io::split(b);

        let peer = tokio::spawn(async move {
            let mut buf = BufReader::new(&mut peer_read);
            let mut line = String::new();
            buf.read_line(&mut line).await.unwrap();
            let req: Request = serde_json::from_str(line.trim()).unwrap();
            let resp = Response::success(
                req.id,
                serde_json::json!({
                    "protocol_version": "9.9",
                    "server_info": {"name": "impostor", "version": "0.0.0"},
                }),
            );
            let mut out = serde_json::to_string(&resp).unwrap();
            out.push('\n');
            peer_write.write_all(out.as_bytes()).await.unwrap();
        });

        let mut conn = Connection::over_streams(read, write);
        let err = conn.initialize().await.unwrap_err();
        match err {
            TransportError::Protocol(msg) => assert!(msg.contains("9.9")),
            other => panic!("expected ProtocolError, got {other:?}"),
        }
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_rejects_malformed_result() {
        let (a, b) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(a);
        let (mut peer_read, mut peer_write) = tokio::io::split(b);

        let peer = tokio::spawn(async move {
            let mut buf = BufReader::new(&mut peer_read);
            let mut line = String::new();
            buf.read_line(&mut line).await.unwrap();
            let req: Request = serde_json::from_str(line.trim()).unwrap();
            // No protocol_version, no server_info.
            let resp = Response::success(req.id, serde_json::json!({"ready": true}));
            let mut out = serde_json::to_string(&resp).unwrap();
            out.push('\n');
            peer_write.write_all(out.as_bytes()).await.unwrap();
        });

        let mut conn = Connection::over_streams(read, write);
        let err = conn.initialize().await.unwrap_err();
        match err {
            TransportError::Protocol(msg) => {
                assert!(msg.contains("malformed initialize result"))
            }
            other => panic!("expected ProtocolError, got {other:?}"),
        }
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_detects_id_mismatch() {
        let (a, b) = tokio::io::duplex(1024);
        let (read, write) = tokio::io::split(a);
        let (mut peer_read, mut peer_write) = tokio::io::split(b);

        let peer = tokio::spawn(async move {
            let mut buf = BufReader::new(&mut peer_read);
            let mut line = String::new();
            buf.read_line(&mut line).await.unwrap();
            let wrong = Response::success(999, serde_json::json!({}));
            let mut out = serde_json::to_string(&wrong).unwrap();
            out.push('\n');
            peer_write.write_all(out.as_bytes()).await.unwrap();
        });

        let mut conn = Connection::over_streams(read, write);
        let err = conn
            .request("list_capabilities", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
        peer.await.unwrap();
    }
}
