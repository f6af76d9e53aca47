use crate::order::{Order, PartGroup};

use super::{AgentOutcome, ComplianceAgent, Finding};

pub const EDGE_BANDING_REMOVED: &str = "Edge banding removed for ARKALIK part.";
pub const DRILLING_NOT_ALLOWED: &str = "Drilling operations not allowed for ARKALIK parts.";

/// Back panels carry no edge banding and no drilling.
///
/// Edge banding is cleared with a WARN. Drilling is left in place and
/// reported as an ERROR, which blocks the export.
#[derive(Debug, Default, Clone, Copy)]
pub struct PartTypeRulesAgent;

impl ComplianceAgent for PartTypeRulesAgent {
    fn name(&self) -> &'static str {
        "PartTypeRulesAgent"
    }

    fn apply(&self, mut order: Order) -> AgentOutcome {
        let mut findings = Vec::new();

        for (index, part) in order.parts.iter_mut().enumerate() {
            if part.part_group != PartGroup::Arkalik {
                continue;
            }
            // Blank-only values produce no finding but are still cleared.
            let had_edges = part.has_edge_banding();
            part.clear_edge_banding();
            if had_edges {
                findings.push(Finding::warn(self.name(), EDGE_BANDING_REMOVED).at_part(index));
            }
            if part.has_drilling() {
                findings.push(Finding::error(self.name(), DRILLING_NOT_ALLOWED).at_part(index));
            }
        }

        AgentOutcome::new(order, findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::Severity;
    use crate::order::{Material, OrderPart};
    use rust_decimal::Decimal;

    fn order_with(parts: Vec<OrderPart>) -> Order {
        let mut order = Order::new("Test", Material::new(Decimal::from(18), "Beyaz", "MDF"));
        order.parts = parts;
        order
    }

    #[test]
    fn test_arkalik_edges_cleared_with_warn() {
        let order = order_with(vec![
            OrderPart::new(PartGroup::Arkalik, 700, 500, 1).with_edges("Red", "", "1", ""),
            OrderPart::new(PartGroup::Arkalik, 700, 500, 1).with_edges("", "Blue", "", ""),
        ]);
        let outcome = PartTypeRulesAgent.apply(order);

        assert_eq!(outcome.findings.len(), 2);
        assert!(outcome.findings.iter().all(|f| f.severity == Severity::Warn));
        assert_eq!(outcome.findings[1].part_index, Some(1));
        for part in &outcome.order.parts {
            assert!(part.edges().iter().all(Option::is_none));
        }
    }

    #[test]
    fn test_arkalik_drilling_is_error_and_kept() {
        let order = order_with(vec![
            OrderPart::new(PartGroup::Arkalik, 700, 500, 1).with_drilling("D8", None),
        ]);
        let outcome = PartTypeRulesAgent.apply(order);

        assert_eq!(outcome.findings.len(), 1);
        assert!(outcome.findings[0].is_error());
        assert_eq!(outcome.findings[0].message, DRILLING_NOT_ALLOWED);
        assert_eq!(outcome.order.parts[0].drill_code_1.as_deref(), Some("D8"));
    }

    #[test]
    fn test_govde_untouched() {
        let order = order_with(vec![OrderPart::new(PartGroup::Govde, 700, 500, 1)
            .with_edges("Green", "1", "1", "1")
            .with_drilling("D8", Some("D5"))]);
        let outcome = PartTypeRulesAgent.apply(order.clone());

        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.order, order);
    }

    #[test]
    fn test_idempotent_on_cleaned_output() {
        let order = order_with(vec![
            OrderPart::new(PartGroup::Arkalik, 700, 500, 1).with_edges("Red", "", "", ""),
        ]);
        let first = PartTypeRulesAgent.apply(order);
        let second = PartTypeRulesAgent.apply(first.order.clone());
        assert!(second.findings.is_empty());
        assert_eq!(second.order, first.order);
    }
}
