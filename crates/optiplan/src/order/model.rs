use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tracking::MIN_TOKEN_LEN;

/// Panel family. Determines which edge/drilling rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartGroup {
    /// Body/carcass panel.
    Govde,
    /// Back panel: never edge-banded, never drilled.
    Arkalik,
}

impl PartGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            PartGroup::Govde => "GOVDE",
            PartGroup::Arkalik => "ARKALIK",
        }
    }
}

impl fmt::Display for PartGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartGroup {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GOVDE" => Ok(PartGroup::Govde),
            "ARKALIK" => Ok(PartGroup::Arkalik),
            other => Err(ValidationError::new(
                "part_group",
                format!("unknown part group '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Validated,
    Exported,
    DeliveryPending,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Validated => "VALIDATED",
            OrderStatus::Exported => "EXPORTED",
            OrderStatus::DeliveryPending => "DELIVERY_PENDING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Forward-only lifecycle; any live order may be cancelled.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (New, Validated)
                | (Validated, Exported)
                | (Exported, DeliveryPending)
                | (DeliveryPending, Delivered)
                | (New | Validated | Exported | DeliveryPending, Cancelled)
        )
    }

    /// Whether the export pipeline may (re-)emit files for an order in this state.
    pub fn is_exportable(self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::Validated | OrderStatus::Exported
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NEW" => Ok(OrderStatus::New),
            "VALIDATED" => Ok(OrderStatus::Validated),
            "EXPORTED" => Ok(OrderStatus::Exported),
            "DELIVERY_PENDING" => Ok(OrderStatus::DeliveryPending),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(ValidationError::new(
                "status",
                format!("unknown order status '{}'", other),
            )),
        }
    }
}

/// Board the order is cut from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Board thickness in millimetres.
    pub thickness_mm: Decimal,
    /// Color code, e.g. "Beyaz".
    pub color: String,
    /// Material name written into the material-code column.
    pub name: String,
}

impl Material {
    pub fn new(thickness_mm: Decimal, color: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            thickness_mm: thickness_mm.normalize(),
            color: color.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPart {
    /// Row id once persisted.
    #[serde(default)]
    pub id: Option<i64>,
    pub part_group: PartGroup,
    pub length_mm: u32,
    pub width_mm: u32,
    pub quantity: u32,
    /// Declared thickness. Only ARKALIK parts use it; GOVDE parts follow the order.
    #[serde(default)]
    pub thickness_mm: Option<Decimal>,
    /// Raw grain code as received.
    #[serde(default)]
    pub grain: Option<String>,
    /// Mapped OptiPlanning grain value, set by the grain agent.
    #[serde(default)]
    pub grain_opti: Option<u8>,
    #[serde(default)]
    pub edge_banding_u1: Option<String>,
    #[serde(default)]
    pub edge_banding_u2: Option<String>,
    #[serde(default)]
    pub edge_banding_k1: Option<String>,
    #[serde(default)]
    pub edge_banding_k2: Option<String>,
    #[serde(default)]
    pub drill_code_1: Option<String>,
    #[serde(default)]
    pub drill_code_2: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl OrderPart {
    pub fn new(part_group: PartGroup, length_mm: u32, width_mm: u32, quantity: u32) -> Self {
        Self {
            id: None,
            part_group,
            length_mm,
            width_mm,
            quantity,
            thickness_mm: None,
            grain: None,
            grain_opti: None,
            edge_banding_u1: None,
            edge_banding_u2: None,
            edge_banding_k1: None,
            edge_banding_k2: None,
            drill_code_1: None,
            drill_code_2: None,
            description: None,
        }
    }

    pub fn with_grain(mut self, grain: &str) -> Self {
        self.grain = Some(grain.to_string());
        self
    }

    pub fn with_edges(mut self, u1: &str, u2: &str, k1: &str, k2: &str) -> Self {
        let set = |v: &str| (!v.is_empty()).then(|| v.to_string());
        self.edge_banding_u1 = set(u1);
        self.edge_banding_u2 = set(u2);
        self.edge_banding_k1 = set(k1);
        self.edge_banding_k2 = set(k2);
        self
    }

    pub fn with_drilling(mut self, first: &str, second: Option<&str>) -> Self {
        self.drill_code_1 = Some(first.to_string());
        self.drill_code_2 = second.map(str::to_string);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn edges(&self) -> [Option<&str>; 4] {
        [
            self.edge_banding_u1.as_deref(),
            self.edge_banding_u2.as_deref(),
            self.edge_banding_k1.as_deref(),
            self.edge_banding_k2.as_deref(),
        ]
    }

    pub fn has_edge_banding(&self) -> bool {
        self.edges().iter().any(|e| is_set(*e))
    }

    pub fn clear_edge_banding(&mut self) {
        self.edge_banding_u1 = None;
        self.edge_banding_u2 = None;
        self.edge_banding_k1 = None;
        self.edge_banding_k2 = None;
    }

    pub fn has_drilling(&self) -> bool {
        is_set(self.drill_code_1.as_deref()) || is_set(self.drill_code_2.as_deref())
    }
}

fn is_set(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Customer name snapshot taken when the order was created.
    pub customer_name: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub material: Material,
    pub tracking_token: String,
    #[serde(default)]
    pub reminder_count: u32,
    #[serde(default)]
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub parts: Vec<OrderPart>,
}

impl Order {
    pub fn new(customer_name: impl Into<String>, material: Material) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            customer_name: customer_name.into(),
            status: OrderStatus::New,
            created_at: Utc::now(),
            material,
            tracking_token: generate_tracking_token(),
            reminder_count: 0,
            last_reminder_sent_at: None,
            parts: Vec::new(),
        }
    }

    pub fn with_part(mut self, part: OrderPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Structural checks on the aggregate. Rule checks live in the compliance agents.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::new("id", "must not be empty"));
        }
        if self.customer_name.trim().is_empty() {
            return Err(ValidationError::new("customer_name", "must not be empty"));
        }
        if self.material.thickness_mm <= Decimal::ZERO {
            return Err(ValidationError::new(
                "material.thickness_mm",
                "must be positive",
            ));
        }
        if self.tracking_token.chars().count() < MIN_TOKEN_LEN {
            return Err(ValidationError::new(
                "tracking_token",
                format!("must be at least {} characters", MIN_TOKEN_LEN),
            ));
        }
        if self.parts.is_empty() {
            return Err(ValidationError::new("parts", "order has no parts"));
        }
        for (i, part) in self.parts.iter().enumerate() {
            if part.length_mm == 0 {
                return Err(ValidationError::new(
                    format!("parts[{}].length_mm", i),
                    "must be positive",
                ));
            }
            if part.width_mm == 0 {
                return Err(ValidationError::new(
                    format!("parts[{}].width_mm", i),
                    "must be positive",
                ));
            }
            if part.quantity == 0 {
                return Err(ValidationError::new(
                    format!("parts[{}].quantity", i),
                    "must be at least 1",
                ));
            }
            if let Some(t) = part.thickness_mm {
                if t <= Decimal::ZERO {
                    return Err(ValidationError::new(
                        format!("parts[{}].thickness_mm", i),
                        "must be positive",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Opaque, unguessable tracking token (32 hex characters).
pub fn generate_tracking_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
