//! # starbridge
//!
//! Multi-agent consultation bridge. A decision-maker process consults
//! independently hosted text-generation specialists over a stdio-framed
//! RPC channel, classifies their free-text opinions into a structured
//! risk signal, and feeds that signal into a two-turn tool-calling loop
//! against an external chat-completion API that renders the final
//! decision.
//!
//! The stack, leaves first:
//!
//! - [`transport`] — child-process spawning, line-framed JSON-RPC, and
//!   request/response correlation.
//! - [`host`] — the capability host: a static specialist registry served
//!   over the transport.
//! - [`client`] — one consultation cycle: discovery, sequential
//!   invocation, per-capability failure isolation.
//! - [`classify`] — pure risk-level and key-line extraction from
//!   unstructured replies.
//! - [`orchestrator`] — the two-turn decision loop with a forced-consult
//!   fallback when the model skips the tool.

pub mod classify;
pub mod client;
pub mod config;
pub mod errors;
pub mod host;
pub mod llm;
pub mod orchestrator;
pub mod report;
pub mod transport;

pub use classify::{key_lines, normalize, risk_level, RiskLevel};
pub use client::CapabilityClient;
pub use host::{enterprise_bridge_roster, CapabilityHost, SpecialistRegistry};
pub use orchestrator::{DecisionOrchestrator, FinalDecision};
pub use report::{Capability, ConsultationReport, Decision};
