//! Capability host binary.
//!
//! Serves the Enterprise-bridge specialist roster over stdin/stdout.
//! Stdout carries nothing but framed messages; logs go to stderr.
//!
//! # Environment Variables
//!
//! - `AZURE_OPENAI_ENDPOINT` — chat-completion endpoint (required)
//! - `AZURE_OPENAI_API_KEY` — API credential (required)
//! - `AZURE_OPENAI_DEPLOYMENT` — deployment or model name (required)
//! - `AZURE_OPENAI_API_VERSION` — API version (optional)
//! - `RUST_LOG` — log filter (default: "info")
//!
//! A `.env` file in the working directory seeds missing variables.

use std::sync::Arc;

use anyhow::Context;

use starbridge::config::Settings;
use starbridge::host::{enterprise_bridge_roster, CapabilityHost};
use starbridge::llm::AzureChatClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Settings::load().context("configuration incomplete")?;
    let client = Arc::new(AzureChatClient::new(&settings)?);
    let registry = enterprise_bridge_roster(client);

    let host = CapabilityHost::new("Puente del Enterprise", registry);
    host.serve_stdio().await.context("host serve loop failed")
}
