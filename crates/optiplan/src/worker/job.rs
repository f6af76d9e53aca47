use std::path::PathBuf;

use crate::compliance::Finding;
use crate::error::ExportError;
use crate::order::Order;
use crate::pipeline::ExportOutcome;

/// One order queued for export.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub id: String,
    pub order: Order,
    /// Who asked for the export, recorded on the audit rows.
    pub actor: Option<String>,
}

impl ExportJob {
    pub fn new(order: Order) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order,
            actor: None,
        }
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

#[derive(Debug)]
pub struct ExportJobResult {
    pub job_id: String,
    pub order_id: String,
    pub success: bool,
    pub files: Vec<PathBuf>,
    pub findings: Vec<Finding>,
    pub error: Option<String>,
}

impl ExportJobResult {
    pub fn from_outcome(job: &ExportJob, result: Result<ExportOutcome, ExportError>) -> Self {
        match result {
            Ok(outcome) => Self {
                job_id: job.id.clone(),
                order_id: job.order.id.clone(),
                success: true,
                files: outcome
                    .artifacts
                    .into_iter()
                    .map(|a| a.file_path)
                    .collect(),
                findings: outcome.findings,
                error: None,
            },
            Err(e) => {
                let error = e.to_string();
                let findings = match e {
                    ExportError::RuleViolation { findings } => findings,
                    _ => vec![],
                };
                Self {
                    findings,
                    ..Self::failure(job, error)
                }
            }
        }
    }

    pub fn failure(job: &ExportJob, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            order_id: job.order.id.clone(),
            success: false,
            files: vec![],
            findings: vec![],
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Material, OrderPart, PartGroup};
    use rust_decimal::Decimal;

    fn job() -> ExportJob {
        let order = Order::new("Ahmet", Material::new(Decimal::from(18), "Beyaz", "MDF"))
            .with_part(OrderPart::new(PartGroup::Govde, 700, 500, 1));
        ExportJob::new(order).by("planner")
    }

    #[test]
    fn test_job_new() {
        let job = job();
        assert!(!job.id.is_empty());
        assert_eq!(job.actor.as_deref(), Some("planner"));
    }

    #[test]
    fn test_rule_violation_keeps_findings() {
        let job = job();
        let findings = vec![Finding::error("PartTypeRulesAgent", "no drilling").at_part(0)];
        let result = ExportJobResult::from_outcome(
            &job,
            Err(ExportError::RuleViolation {
                findings: findings.clone(),
            }),
        );

        assert!(!result.success);
        assert_eq!(result.findings, findings);
        assert!(result.error.unwrap().contains("1 error finding"));
    }

    #[test]
    fn test_failure() {
        let job = job();
        let result = ExportJobResult::failure(&job, "disk full".to_string());
        assert!(!result.success);
        assert_eq!(result.order_id, job.order.id);
        assert_eq!(result.error.as_deref(), Some("disk full"));
    }
}
