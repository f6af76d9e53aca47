//! Rule agents applied to an order before export.
//!
//! Each agent takes the order by value and hands back a possibly modified
//! order with its findings. [`CompliancePipeline`] folds the agents left to
//! right; a single ERROR finding blocks export.

mod agent;
mod finding;
mod grain_mapping;
mod part_type;
mod pipeline;

pub use agent::{AgentOutcome, ComplianceAgent};
pub use finding::{Finding, Severity};
pub use grain_mapping::GrainMappingAgent;
pub use part_type::PartTypeRulesAgent;
pub use pipeline::{ComplianceResult, CompliancePipeline};
