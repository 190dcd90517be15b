//! Fulfillment domain module: shipments, their grouping and the pick-up fast
//! path.
//!
//! Deterministic domain logic only (no IO, no storage); the ledger's shipment
//! workflow is reached through [`ports::ShipmentWorkflow`].

pub mod grouping;
pub mod partition;
pub mod ports;
pub mod shipment;

pub use grouping::{BaseKey, FulfillmentModeKey, ShipmentKey, ShipmentKeyBuilder, group_lines};
pub use partition::{create_shipments, fast_path};
pub use ports::ShipmentWorkflow;
pub use shipment::{
    Move, NewShipment, Shipment, ShipmentKind, ShipmentState, StockLevels, Transition,
};
