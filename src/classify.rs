//! Free-text response classification.
//!
//! Specialists answer in natural language with no structural guarantee.
//! These pure functions extract a best-effort signal from a reply: a
//! discrete risk level from a closed marker vocabulary, and up to a few
//! "key lines" when the reply follows the structured
//! `RIESGO:`/`RECOMENDACIÓN:` format. `Unspecified` is a legitimate
//! outcome, not a parse failure.

use serde::{Deserialize, Serialize};

/// Default cap on the number of key lines extracted from a reply.
pub const MAX_KEY_LINES: usize = 4;

/// Structured line prefixes recognized by [`key_lines`], compared against
/// the normalized form of each line.
const KEY_PREFIXES: [&str; 6] = [
    "RIESGO:",
    "RECOMENDACION:",
    "JUSTIFICACION:",
    "CONCLUSION:",
    "ACCION:",
    "ACCION ",
];

// ---------------------------------------------------------------------------
// RiskLevel
// ---------------------------------------------------------------------------

/// Severity extracted from a specialist reply.
///
/// Totally ordered: `Critical > High > Medium > Low > Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Critical => write!(f, "CRITICAL"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Unspecified => write!(f, "UNSPECIFIED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Uppercase the text and fold a fixed table of accented Latin characters
/// to their unaccented equivalents. Characters outside the table pass
/// through unchanged. Idempotent.
pub fn normalize(text: &str) -> String {
    text.to_uppercase()
        .chars()
        .map(|c| match c {
            'Á' | 'Ä' | 'À' => 'A',
            'É' | 'Ë' | 'È' => 'E',
            'Í' | 'Ï' | 'Ì' => 'I',
            'Ó' | 'Ö' | 'Ò' => 'O',
            'Ú' | 'Ü' | 'Ù' => 'U',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Risk extraction
// ---------------------------------------------------------------------------

/// Scan the normalized text for risk markers in fixed priority order.
///
/// `CRITICO`/`CRITICA` wins over `ALTO`, which wins over `MEDIO`, which
/// wins over `BAJO`. The checks run in priority order regardless of where
/// the markers appear in the text; absence of all markers yields
/// [`RiskLevel::Unspecified`].
pub fn risk_level(text: &str) -> RiskLevel {
    let t = normalize(text);
    if t.contains("CRITICO") || t.contains("CRITICA") {
        RiskLevel::Critical
    } else if t.contains("ALTO") {
        RiskLevel::High
    } else if t.contains("MEDIO") {
        RiskLevel::Medium
    } else if t.contains("BAJO") {
        RiskLevel::Low
    } else {
        RiskLevel::Unspecified
    }
}

// ---------------------------------------------------------------------------
// Key-line extraction
// ---------------------------------------------------------------------------

/// Extract up to `max` key lines from a reply.
///
/// Lines whose normalized form starts with one of the structured prefixes
/// (`RIESGO:`, `RECOMENDACION:`, ...) are preferred, in original order.
/// When no line is structured, the first `max` non-empty lines serve as a
/// best-effort excerpt. Empty input yields an empty vector.
pub fn key_lines(text: &str, max: usize) -> Vec<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let structured: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| {
            let n = normalize(l);
            KEY_PREFIXES.iter().any(|p| n.starts_with(p))
        })
        .collect();

    let chosen = if structured.is_empty() { &lines } else { &structured };
    chosen.iter().take(max).map(|l| l.to_string()).collect()
}
