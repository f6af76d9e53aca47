use crate::order::{GrainCode, Order};

use super::{AgentOutcome, ComplianceAgent, Finding};

/// Maps each part's grain code to its OptiPlanning value.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrainMappingAgent;

impl ComplianceAgent for GrainMappingAgent {
    fn name(&self) -> &'static str {
        "GrainMappingAgent"
    }

    fn apply(&self, mut order: Order) -> AgentOutcome {
        let mut findings = Vec::new();

        for (index, part) in order.parts.iter_mut().enumerate() {
            let raw = match part.grain.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => raw,
                _ => {
                    findings.push(
                        Finding::error(self.name(), "Grain code is missing.").at_part(index),
                    );
                    continue;
                }
            };
            match GrainCode::parse(raw) {
                Some(code) => part.grain_opti = Some(code.opti_value()),
                None => findings.push(
                    Finding::error(self.name(), format!("Invalid grain code '{}'.", raw))
                        .at_part(index),
                ),
            }
        }

        AgentOutcome::new(order, findings)
    }
}
