//! Specialist registry.
//!
//! Maps capability names to the specialists bound behind them. The
//! registry is populated once at host construction and never mutated —
//! a finalized lookup table, not a mutable global. Capability discovery
//! reports entries in registration order.

use std::sync::Arc;

use crate::errors::LlmError;
use crate::llm::{ChatCompletions, ChatMessage, ChatRequest};
use crate::report::Capability;

/// One named specialist: a fixed instruction block bound to a
/// chat-completion collaborator.
#[derive(Clone)]
pub struct Specialist {
    name: String,
    description: String,
    instructions: String,
    client: Arc<dyn ChatCompletions>,
}

impl Specialist {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
        client: Arc<dyn ChatCompletions>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the bound collaborator to answer one task. The reply is
    /// returned verbatim; no structure is enforced on its content.
    pub async fn run(&self, task: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(self.instructions.clone()),
            ChatMessage::user(task),
        ]);
        let response = self.client.complete(request).await?;
        Ok(response.content().to_string())
    }

    fn capability(&self) -> Capability {
        Capability::new(&self.name, &self.description)
    }
}

/// Immutable, ordered collection of specialists.
pub struct SpecialistRegistry {
    specialists: Vec<Specialist>,
}

impl SpecialistRegistry {
    /// Build the registry. Later duplicates of a name are dropped so
    /// capability names stay unique within a host.
    pub fn new(specialists: Vec<Specialist>) -> Self {
        let mut unique: Vec<Specialist> = Vec::with_capacity(specialists.len());
        for s in specialists {
            if unique.iter().any(|u| u.name == s.name) {
                log::warn!("duplicate specialist '{}' ignored", s.name);
                continue;
            }
            unique.push(s);
        }
        Self { specialists: unique }
    }

    /// Capability entries in registration order.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.specialists.iter().map(|s| s.capability()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Specialist> {
        self.specialists.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Default roster
// ---------------------------------------------------------------------------

/// The four bridge officers: (name, description, instruction block).
const BRIDGE_ROSTER: [(&str, &str, &str); 4] = [
    (
        "Oficial de Ciencias",
        "Especialista del Enterprise: análisis científico de sensores y fenómenos",
        "Eres el Oficial de Ciencias del Enterprise-D. Tu responsabilidad es:\n\
         - Analizar datos de sensores\n\
         - Investigar fenómenos alienígenas\n\
         - Estudiar anomalías espaciales\n\
         - Proporcionar análisis científicos detallados\n\
         \n\
         Responde en español como oficial Starfleet con precisión científica.",
    ),
    (
        "Jefe de Ingeniería",
        "Especialista del Enterprise: capacidad del motor warp y sistemas técnicos",
        "Eres el Jefe de Ingeniería del Enterprise. Tu responsabilidad es:\n\
         - Evaluar capacidad del motor warp\n\
         - Evaluar salud de sistemas técnicos\n\
         - Determinar factibilidad técnica de operaciones\n\
         - Proporcionar estimaciones de tiempo y recursos\n\
         \n\
         Responde en español como oficial Starfleet con autoridad técnica.",
    ),
    (
        "Jefe de Seguridad",
        "Especialista del Enterprise: riesgos tácticos y seguridad de la tripulación",
        "Eres el Jefe de Seguridad del Enterprise. Tu responsabilidad es:\n\
         - Evaluar riesgos tácticos\n\
         - Evaluar seguridad de la tripulación\n\
         - Identificar amenazas potenciales\n\
         - Proporcionar recomendaciones de seguridad\n\
         \n\
         Formato de respuesta:\n\
         RIESGO: [CRÍTICO/ALTO/MEDIO/BAJO]\n\
         RECOMENDACIÓN: [acción específica en protocolos de la nave]\n\
         JUSTIFICACIÓN: [por qué es importante para la seguridad]\n\
         \n\
         Responde en español como oficial Starfleet con precisión táctica.",
    ),
    (
        "Oficial Médico",
        "Especialista del Enterprise: impacto en la salud y bienestar de la tripulación",
        "Eres el Oficial Médico del Enterprise. Tu responsabilidad es:\n\
         - Evaluar impacto en la salud de la tripulación\n\
         - Determinar viabilidad médica de operaciones\n\
         - Proporcionar recomendaciones sanitarias\n\
         - Evaluar riesgos para bienestar\n\
         \n\
         Responde en español como oficial Starfleet con autoridad médica.",
    ),
];

/// Build the default Enterprise-bridge roster, binding every officer to
/// the same chat-completion collaborator.
pub fn enterprise_bridge_roster(client: Arc<dyn ChatCompletions>) -> SpecialistRegistry {
    SpecialistRegistry::new(
        BRIDGE_ROSTER
            .iter()
            .map(|(name, description, instructions)| {
                Specialist::new(*name, *description, *instructions, Arc::clone(&client))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::ChatResponse;

    struct StubChat(&'static str);

    #[async_trait]
    impl ChatCompletions for StubChat {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                message: ChatMessage::assistant(Some(self.0.to_string()), None),
            })
        }
    }

    #[test]
    fn test_default_roster_names_in_order() {
        let registry = enterprise_bridge_roster(Arc::new(StubChat("ok")));
        let names: Vec<String> = registry
            .capabilities()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "Oficial de Ciencias",
                "Jefe de Ingeniería",
                "Jefe de Seguridad",
                "Oficial Médico",
            ]
        );
    }

    #[test]
    fn test_registry_drops_duplicate_names() {
        let client: Arc<dyn ChatCompletions> = Arc::new(StubChat("ok"));
        let registry = SpecialistRegistry::new(vec![
            Specialist::new("A", "first", "i", Arc::clone(&client)),
            Specialist::new("A", "second", "i", Arc::clone(&client)),
            Specialist::new("B", "other", "i", Arc::clone(&client)),
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("A").unwrap().description, "first");
    }

    #[tokio::test]
    async fn test_specialist_run_passes_instructions() {
        let specialist = Specialist::new(
            "Jefe de Seguridad",
            "seguridad",
            "instrucciones",
            Arc::new(StubChat("RIESGO: BAJO")),
        );
        let reply = specialist.run("evalúa la maniobra").await.unwrap();
        assert_eq!(reply, "RIESGO: BAJO");
    }
}
