use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::order::Order;

use super::{ComplianceAgent, Finding, GrainMappingAgent, PartTypeRulesAgent};

/// Result of one compliance run.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceResult {
    pub ok: bool,
    /// Every finding, in agent order.
    pub report: Vec<Finding>,
    /// The compliant order; `None` when any ERROR was found.
    pub data: Option<Order>,
}

impl ComplianceResult {
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.report.iter().filter(|f| f.is_error())
    }
}

/// Ordered chain of agents.
#[derive(Clone)]
pub struct CompliancePipeline {
    agents: Vec<Arc<dyn ComplianceAgent>>,
}

impl Default for CompliancePipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl CompliancePipeline {
    /// Part-type rules first, then grain mapping.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(PartTypeRulesAgent),
            Arc::new(GrainMappingAgent),
        ])
    }

    pub fn new(agents: Vec<Arc<dyn ComplianceAgent>>) -> Self {
        Self { agents }
    }

    pub fn agent_names(&self) -> Vec<&'static str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    pub fn run(&self, order: Order) -> ComplianceResult {
        let span = tracing::info_span!("compliance", order_id = %order.id);
        let _guard = span.enter();

        let mut report = Vec::new();
        let mut current = order;

        for agent in &self.agents {
            let input = current.clone();
            match panic::catch_unwind(AssertUnwindSafe(|| agent.apply(input))) {
                Ok(outcome) => {
                    report.extend(outcome.findings);
                    current = outcome.order;
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    tracing::error!(agent = agent.name(), %reason, "Compliance agent failed");
                    report.push(Finding::error(
                        agent.name(),
                        format!("Agent {} failed unexpectedly: {}", agent.name(), reason),
                    ));
                }
            }
        }

        let error_count = report.iter().filter(|f| f.is_error()).count();
        let ok = error_count == 0;
        tracing::info!(
            findings = report.len(),
            errors = error_count,
            ok,
            "Compliance run finished"
        );

        ComplianceResult {
            ok,
            report,
            data: ok.then_some(current),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
