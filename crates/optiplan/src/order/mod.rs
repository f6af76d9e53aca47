//! Order aggregate: customer order, material descriptor and its panel parts.

pub mod grain;
pub mod lifecycle;
pub mod model;

pub use grain::GrainCode;
pub use lifecycle::transition;
pub use model::{generate_tracking_token, Material, Order, OrderPart, OrderStatus, PartGroup};
