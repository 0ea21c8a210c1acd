//! Decision orchestrator.
//!
//! Drives the chat-completion collaborator through exactly two turns.
//! Turn 1 offers the `consult_bridge` tool and lets the model decide;
//! turn 2 supplies the consultation evidence and asks for the final
//! decision. When the model skips the tool, the orchestrator forces the
//! consultation itself and injects a synthetic tool message, so the
//! second turn always has evidence available.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::client::CapabilityClient;
use crate::errors::{ConsultationError, OrchestratorError};
use crate::llm::{ChatCompletions, ChatMessage, ChatRequest, ToolCall};
use crate::report::{ConsultationReport, Decision};

/// Name of the single tool exposed to the model.
pub const CONSULT_TOOL: &str = "consult_bridge";

/// Schema of the `consult_bridge` tool.
static CONSULT_TOOL_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": CONSULT_TOOL,
            "description": "Consulta a los especialistas del puente y devuelve un JSON con sus respuestas clasificadas por riesgo.",
            "parameters": {
                "type": "object",
                "properties": {
                    "task": {
                        "type": "string",
                        "description": "Escenario o pregunta para los especialistas",
                    },
                    "capabilities": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Lista opcional de especialistas a consultar; si se omite se consultan todos",
                    },
                },
                "required": ["task"],
            },
        },
    })
});

/// System instructions for the decision maker. The decision heuristic is
/// stated here as a contract the model must follow; the orchestrator also
/// enforces it programmatically over the report.
const CAPTAIN_SYSTEM_PROMPT: &str = "\
Eres el Capitán del Enterprise-D.
Tu misión es tomar una decisión final tras consultar a los especialistas del puente.

REGLAS OBLIGATORIAS:
1) Antes de decidir, SIEMPRE llama a la herramienta consult_bridge.
2) Política de decisión:
   - Si algún especialista reporta riesgo CRÍTICO o ALTO → DECISIÓN = NO AUTORIZAR
   - Si no hay ALTO/CRÍTICO pero hay MEDIO → DECISIÓN = AUTORIZAR CON MITIGACIONES
   - Si no hay ALTO/CRÍTICO/MEDIO → DECISIÓN = AUTORIZAR
3) Cita evidencias concretas devueltas por los especialistas, incluidas las consultas que fallaron.
4) No ejecutes acciones: solo recomendación/decisión y siguientes pasos.

FORMATO DE SALIDA (exacto):
DECISIÓN: <NO AUTORIZAR|AUTORIZAR CON MITIGACIONES|AUTORIZAR>
MOTIVO: <explicación de 3-6 líneas>
EVIDENCIAS:
- <especialista>: <1-2 bullets cortos con evidencias>
MITIGACIONES / SIGUIENTES PASOS:
- <lista de 3-6 acciones>
";

// ---------------------------------------------------------------------------
// Consult seam
// ---------------------------------------------------------------------------

/// The consultation operation as the orchestrator sees it. Production
/// binds this to [`CapabilityClient`]; tests substitute counting stubs.
#[async_trait]
pub trait ConsultBridge: Send + Sync {
    async fn consult(
        &self,
        task: &str,
        capabilities: Option<&[String]>,
    ) -> Result<ConsultationReport, ConsultationError>;
}

#[async_trait]
impl ConsultBridge for CapabilityClient {
    async fn consult(
        &self,
        task: &str,
        capabilities: Option<&[String]>,
    ) -> Result<ConsultationReport, ConsultationError> {
        CapabilityClient::consult(self, task, capabilities).await
    }
}

// ---------------------------------------------------------------------------
// Turn-1 outcome
// ---------------------------------------------------------------------------

/// What the model did with the offered tool on its first turn. Both arms
/// are handled explicitly; the skipped arm forces the consultation.
#[derive(Debug)]
pub enum TurnOutcome {
    ToolRequested(Vec<ToolCall>),
    ToolSkipped { content: String },
}

impl TurnOutcome {
    fn from_tool_calls(content: String, tool_calls: &[ToolCall]) -> Self {
        if tool_calls.is_empty() {
            TurnOutcome::ToolSkipped { content }
        } else {
            TurnOutcome::ToolRequested(tool_calls.to_vec())
        }
    }
}

/// Parsed `consult_bridge` arguments, after defensive coercion.
#[derive(Debug, PartialEq)]
struct ConsultArgs {
    task: String,
    capabilities: Option<Vec<String>>,
}

/// Parse the model's raw argument string. A parse failure or a missing
/// `task` substitutes the original scenario; a scalar `capabilities`
/// value is coerced to a one-element list.
fn parse_consult_args(raw: &str, scenario: &str) -> ConsultArgs {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("unparseable tool arguments ({e}); using the scenario as task");
            return ConsultArgs {
                task: scenario.to_string(),
                capabilities: None,
            };
        }
    };

    let task = parsed["task"]
        .as_str()
        .filter(|t| !t.is_empty())
        .unwrap_or(scenario)
        .to_string();

    let capabilities = match &parsed["capabilities"] {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .iter()
                .map(|v| match v.as_str() {
                    Some(s) => s.to_string(),
                    None => v.to_string(),
                })
                .collect(),
        ),
        scalar => Some(vec![scalar
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| scalar.to_string())]),
    };

    ConsultArgs { task, capabilities }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Outcome of one orchestration run.
#[derive(Debug)]
pub struct FinalDecision {
    /// Decision computed programmatically from the report — deterministic
    /// regardless of how the model phrased its answer.
    pub decision: Decision,
    /// The model's second-turn answer, verbatim.
    pub narrative: String,
    /// The consultation evidence the decision rests on.
    pub report: ConsultationReport,
}

/// Two-turn tool-calling decision loop.
pub struct DecisionOrchestrator {
    chat: Arc<dyn ChatCompletions>,
    bridge: Arc<dyn ConsultBridge>,
}

impl DecisionOrchestrator {
    pub fn new(chat: Arc<dyn ChatCompletions>, bridge: Arc<dyn ConsultBridge>) -> Self {
        Self { chat, bridge }
    }

    /// Produce a final decision for one scenario.
    ///
    /// A failed consultation does not abort the run: the model sees an
    /// error payload instead of evidence, and with zero successful
    /// results the programmatic decision stays at the conservative
    /// [`Decision::Deny`].
    pub async fn run(&self, scenario: &str) -> Result<FinalDecision, OrchestratorError> {
        let mut messages = vec![
            ChatMessage::system(CAPTAIN_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Escenario del Capitán:\n{scenario}\n\nConsulta a los especialistas y emite la decisión final."
            )),
        ];

        // Turn 1: the model decides whether to consult.
        let turn1 = self
            .chat
            .complete(
                ChatRequest::new(messages.clone())
                    .with_tools(vec![CONSULT_TOOL_SCHEMA.clone()], "auto".into()),
            )
            .await?;

        let outcome =
            TurnOutcome::from_tool_calls(turn1.content().to_string(), turn1.tool_calls());

        let mut report: Option<ConsultationReport> = None;
        match outcome {
            TurnOutcome::ToolRequested(calls) => {
                log::info!("model requested {} tool call(s)", calls.len());
                messages.push(ChatMessage::assistant(
                    turn1.message.content.clone(),
                    Some(calls.clone()),
                ));

                for call in &calls {
                    let call_id = call.id.clone().unwrap_or_else(|| "unknown".to_string());
                    if call.function.name != CONSULT_TOOL {
                        messages.push(ChatMessage::tool(
                            call_id,
                            serde_json::json!({
                                "error": format!("Herramienta no soportada: {}", call.function.name)
                            })
                            .to_string(),
                        ));
                        continue;
                    }

                    let args = parse_consult_args(&call.function.arguments, scenario);
                    let payload = self
                        .execute_consult(&args.task, args.capabilities.as_deref(), &mut report)
                        .await;
                    messages.push(ChatMessage::tool(call_id, payload));
                }
            }
            TurnOutcome::ToolSkipped { content } => {
                // Deterministic fallback: force the consultation so the
                // second turn always has evidence.
                log::info!("model skipped the tool; forcing a consultation");
                messages.push(ChatMessage::assistant(Some(content), None));
                let payload = self.execute_consult(scenario, None, &mut report).await;
                messages.push(ChatMessage::tool("forced", payload));
            }
        }

        // Turn 2: final answer, no further tool use offered.
        let turn2 = self.chat.complete(ChatRequest::new(messages)).await?;

        let report = report.unwrap_or_default();
        Ok(FinalDecision {
            decision: Decision::from_report(&report),
            narrative: turn2.content().to_string(),
            report,
        })
    }

    /// Run one consultation and render its payload for the model. A
    /// consultation failure becomes an error payload, never a panic of
    /// the whole run.
    async fn execute_consult(
        &self,
        task: &str,
        capabilities: Option<&[String]>,
        report: &mut Option<ConsultationReport>,
    ) -> String {
        match self.bridge.consult(task, capabilities).await {
            Ok(r) => {
                let payload = serde_json::to_string_pretty(&r)
                    .unwrap_or_else(|_| "{}".to_string());
                *report = Some(r);
                payload
            }
            Err(e) => {
                log::error!("consultation failed: {e}");
                serde_json::json!({"error": format!("consulta fallida: {e}")}).to_string()
            }
        }
    }
}
