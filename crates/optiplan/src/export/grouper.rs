use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{Order, OrderPart, PartGroup};

/// Thickness assigned to ARKALIK parts that declare none.
pub const ARKALIK_FALLBACK_THICKNESS_MM: u32 = 8;

/// Key of one output workbook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartBin {
    pub part_group: PartGroup,
    /// Normalized, so `18` and `18.0` share a bin.
    pub thickness_mm: Decimal,
    pub color: String,
}

impl PartBin {
    pub fn new(part_group: PartGroup, thickness_mm: Decimal, color: impl Into<String>) -> Self {
        Self {
            part_group,
            thickness_mm: thickness_mm.normalize(),
            color: color.into(),
        }
    }

    /// The bin a part of `order` lands in.
    pub fn for_part(order: &Order, part: &OrderPart) -> Self {
        let thickness = match part.part_group {
            PartGroup::Govde => order.material.thickness_mm,
            PartGroup::Arkalik => part
                .thickness_mm
                .unwrap_or_else(|| Decimal::from(ARKALIK_FALLBACK_THICKNESS_MM)),
        };
        Self::new(part.part_group, thickness, order.material.color.clone())
    }
}

impl fmt::Display for PartBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}mm/{}", self.part_group, self.thickness_mm, self.color)
    }
}

/// Partitions the parts of `order` by [`PartBin`], in first-seen order.
/// Parts keep their relative order inside a bin.
pub fn group_parts(order: &Order) -> Vec<(PartBin, Vec<OrderPart>)> {
    let mut bins: Vec<(PartBin, Vec<OrderPart>)> = Vec::new();

    for part in &order.parts {
        let key = PartBin::for_part(order, part);
        match bins.iter_mut().find(|(bin, _)| *bin == key) {
            Some((_, parts)) => parts.push(part.clone()),
            None => bins.push((key, vec![part.clone()])),
        }
    }

    bins
}
