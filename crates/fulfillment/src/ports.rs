use chrono::{DateTime, Utc};

use forgepos_core::{DomainResult, Privilege, ShipmentId};
use forgepos_sales::Order;

use crate::grouping::ShipmentKeyBuilder;
use crate::shipment::{Shipment, ShipmentKind, Transition};

/// Generic shipment workflow of the ledger.
pub trait ShipmentWorkflow {
    /// Create the shipments of `kind` still owed for `order`, grouping lines
    /// with `keys`. Returns what was created, possibly nothing.
    fn create_shipments(
        &self,
        order: &Order,
        kind: ShipmentKind,
        keys: &dyn ShipmentKeyBuilder,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<Shipment>>;

    /// Apply `step` to every shipment in `ids`, failing as a whole.
    fn transition(
        &self,
        ids: &[ShipmentId],
        step: Transition,
        privilege: Privilege,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()>;

    fn shipments(&self, ids: &[ShipmentId]) -> DomainResult<Vec<Shipment>>;
}
