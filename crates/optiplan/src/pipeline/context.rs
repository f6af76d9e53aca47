use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::compliance::Finding;
use crate::db::artifact_repo::ExportArtifact;
use crate::export::{PartBin, StagedExport};
use crate::order::{Order, OrderPart};

pub struct ExportContext {
    // Input
    pub order: Order,
    pub actor: Option<String>,
    pub exported_at: DateTime<Utc>,

    // Compliance result: every finding, and the compliant order when ok
    pub findings: Vec<Finding>,
    pub compliant: Option<Order>,

    // Grouping result
    pub bins: Vec<(PartBin, Vec<OrderPart>)>,

    // Written but unpublished workbooks
    pub staged: Vec<StagedExport>,
}

impl ExportContext {
    pub fn new(order: Order, actor: Option<&str>) -> Self {
        Self {
            order,
            actor: actor.map(str::to_string),
            exported_at: Utc::now(),
            findings: Vec::new(),
            compliant: None,
            bins: Vec::new(),
            staged: Vec::new(),
        }
    }
}

/// What a successful export produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    /// The order as persisted, after compliance and the status move.
    pub order: Order,
    /// Non-blocking findings (WARN/INFO).
    pub findings: Vec<Finding>,
    pub artifacts: Vec<ExportArtifact>,
}
