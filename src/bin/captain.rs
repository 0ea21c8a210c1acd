//! Decision-maker binary.
//!
//! Spawns the `bridge-host` executable, offers its consultation as a tool
//! to the chat-completion collaborator, and prints the final decision for
//! a demo scenario (or one passed as the first argument).
//!
//! # Environment Variables
//!
//! - `AZURE_OPENAI_ENDPOINT` — chat-completion endpoint (required)
//! - `AZURE_OPENAI_API_KEY` — API credential (required)
//! - `AZURE_OPENAI_DEPLOYMENT` — deployment or model name (required)
//! - `AZURE_OPENAI_API_VERSION` — API version (optional)
//! - `BRIDGE_HOST_BIN` — path to the host executable (default: "bridge-host")
//! - `RUST_LOG` — log filter (default: "info")

use std::sync::Arc;

use anyhow::Context;

use starbridge::client::CapabilityClient;
use starbridge::config::Settings;
use starbridge::llm::AzureChatClient;
use starbridge::orchestrator::DecisionOrchestrator;

const DEMO_SCENARIO: &str = "\
Estamos pasando por una anomalía espacial tipo Tiburón Nebular. \
Parece estar acercándose a la nave con velocidad warp 5.
Necesito evaluación inmediata de:
1. ¿Qué es este fenómeno científicamente?
2. ¿Puede el Enterprise escapar?
3. ¿Cuál es el riesgo para la tripulación?
4. ¿Hay impacto médico potencial?";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Settings::load().context("configuration incomplete")?;
    let chat = Arc::new(AzureChatClient::new(&settings)?);

    let host_bin =
        std::env::var("BRIDGE_HOST_BIN").unwrap_or_else(|_| "bridge-host".to_string());
    let bridge = Arc::new(CapabilityClient::new(host_bin, vec![]));

    let scenario = std::env::args().nth(1).unwrap_or_else(|| DEMO_SCENARIO.to_string());
    println!("Escenario:\n{scenario}\n");

    let orchestrator = DecisionOrchestrator::new(chat, bridge);
    let outcome = orchestrator
        .run(&scenario)
        .await
        .context("orchestration failed")?;

    println!("Decisión calculada: {}", outcome.decision);
    if !outcome.report.failures.is_empty() {
        for failure in &outcome.report.failures {
            println!(
                "Consulta fallida: {} ({})",
                failure.capability_name, failure.error_message
            );
        }
    }
    println!("\n{}", outcome.narrative);
    Ok(())
}
