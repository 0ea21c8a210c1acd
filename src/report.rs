//! Consultation data model.
//!
//! Shapes the structured payload a consultation produces: per-specialist
//! results, isolated failures, and the final decision rendered from the
//! set of detected risk levels. A report is built fresh per consultation
//! and consumed immediately; nothing here persists.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::RiskLevel;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A named, remotely invokable operation taking one free-text task.
///
/// Created at host startup from the static registry; immutable for the
/// process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Unique name within a host.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the invocation arguments (a single required `task`).
    pub input_schema: Value,
}

impl Capability {
    /// Build a capability entry with the standard single-`task` schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let input_schema = serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": format!("Task for {}", name),
                }
            },
            "required": ["task"],
        });
        Self {
            name,
            description: description.into(),
            input_schema,
        }
    }
}

// ---------------------------------------------------------------------------
// Consultation outcomes
// ---------------------------------------------------------------------------

/// One successfully consulted capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationResult {
    pub capability_name: String,
    pub risk_level: RiskLevel,
    /// Up to four structured or leading lines extracted from the reply.
    pub key_lines: Vec<String>,
    /// The specialist's reply, verbatim.
    pub raw_reply: String,
}

/// One capability whose invocation failed. The failure is isolated; it
/// never aborts the consultation of the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationFailure {
    pub capability_name: String,
    pub error_message: String,
}

/// Aggregate of all capability invocation outcomes for one task.
///
/// `results` and `failures` partition the set of capabilities actually
/// attempted, both in discovery order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultationReport {
    /// Every capability the host advertised, whether consulted or not.
    pub available_capabilities: Vec<String>,
    pub results: Vec<ConsultationResult>,
    pub failures: Vec<ConsultationFailure>,
}

impl ConsultationReport {
    /// Number of capabilities actually attempted.
    pub fn attempted(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Highest severity reported by any specialist, if any succeeded.
    pub fn max_risk(&self) -> Option<RiskLevel> {
        self.results.iter().map(|r| r.risk_level).max()
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Final tri-state outcome rendered from a consultation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "DENY")]
    Deny,
    #[serde(rename = "APPROVE_WITH_MITIGATIONS")]
    ApproveWithMitigations,
    #[serde(rename = "APPROVE")]
    Approve,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Deny => write!(f, "DENY"),
            Decision::ApproveWithMitigations => write!(f, "APPROVE_WITH_MITIGATIONS"),
            Decision::Approve => write!(f, "APPROVE"),
        }
    }
}

impl Decision {
    /// Apply the decision precedence rule to a report.
    ///
    /// Any `Critical` or `High` risk denies; otherwise any `Medium`
    /// approves with mitigations; otherwise approves. A report with zero
    /// successful results denies — with no risk evidence available the
    /// conservative outcome stands.
    pub fn from_report(report: &ConsultationReport) -> Self {
        match report.max_risk() {
            None => Decision::Deny,
            Some(RiskLevel::Critical) | Some(RiskLevel::High) => Decision::Deny,
            Some(RiskLevel::Medium) => Decision::ApproveWithMitigations,
            Some(RiskLevel::Low) | Some(RiskLevel::Unspecified) => Decision::Approve,
        }
    }
}
