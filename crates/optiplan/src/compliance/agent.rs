use crate::order::Order;

use super::Finding;

/// The order as an agent leaves it, plus what the agent observed.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub order: Order,
    pub findings: Vec<Finding>,
}

impl AgentOutcome {
    pub fn new(order: Order, findings: Vec<Finding>) -> Self {
        Self { order, findings }
    }
}

/// A single compliance rule.
///
/// Implementations must be idempotent: applying an agent to its own output
/// yields no new findings.
pub trait ComplianceAgent: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, order: Order) -> AgentOutcome;
}
