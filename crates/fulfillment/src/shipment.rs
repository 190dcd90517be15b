use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{
    AggregateRoot, DomainError, DomainResult, LineId, OrderId, PartyId, Privilege, ProductId,
    ShipmentId, ShopId, WarehouseId,
};
use forgepos_sales::FulfillmentMode;

/// Direction of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentKind {
    /// Goods leave the warehouse towards the customer.
    Outbound,
    /// Goods come back from the customer (negative line quantities).
    Return,
}

/// Shipment lifecycle.
///
/// Outbound: `waiting → assigned → packed → done`.
/// Return: `waiting → received → done`.
/// Any state but `done` can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentState {
    Waiting,
    Assigned,
    Packed,
    Received,
    Done,
    Cancel,
}

/// Workflow step applied to a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Reserve stock; fails when stock is short.
    AssignTry,
    /// Reserve without checking stock. Needs [`Privilege::System`].
    AssignForce,
    Pack,
    Receive,
    Done,
    Cancel,
}

/// Stock on hand as seen by the assignment check.
pub trait StockLevels {
    fn available(&self, warehouse: WarehouseId, product: ProductId) -> i64;
}

/// Goods moved for one order line. Quantity is always positive; the direction
/// comes from the shipment kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShipment {
    pub kind: ShipmentKind,
    pub order_id: OrderId,
    pub shop_id: ShopId,
    pub customer: PartyId,
    pub warehouse: WarehouseId,
    pub planned_date: NaiveDate,
    pub fulfillment_mode: FulfillmentMode,
    pub moves: Vec<Move>,
}

/// Aggregate root: Shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    id: ShipmentId,
    kind: ShipmentKind,
    order_id: OrderId,
    shop_id: ShopId,
    customer: PartyId,
    warehouse: WarehouseId,
    planned_date: NaiveDate,
    fulfillment_mode: FulfillmentMode,
    moves: Vec<Move>,
    state: ShipmentState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Shipment {
    pub fn create(id: ShipmentId, new: NewShipment, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        if new.moves.is_empty() {
            return Err(DomainError::validation("shipment must have at least one move"));
        }
        if new.moves.iter().any(|m| m.quantity <= 0) {
            return Err(DomainError::validation("move quantity must be positive"));
        }

        Ok(Self {
            id,
            kind: new.kind,
            order_id: new.order_id,
            shop_id: new.shop_id,
            customer: new.customer,
            warehouse: new.warehouse,
            planned_date: new.planned_date,
            fulfillment_mode: new.fulfillment_mode,
            moves: new.moves,
            state: ShipmentState::Waiting,
            created_at: occurred_at,
            updated_at: occurred_at,
            version: 1,
        })
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn kind(&self) -> ShipmentKind {
        self.kind
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    pub fn customer(&self) -> PartyId {
        self.customer
    }

    pub fn warehouse(&self) -> WarehouseId {
        self.warehouse
    }

    pub fn planned_date(&self) -> NaiveDate {
        self.planned_date
    }

    pub fn fulfillment_mode(&self) -> FulfillmentMode {
        self.fulfillment_mode
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn state(&self) -> ShipmentState {
        self.state
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_done(&self) -> bool {
        self.state == ShipmentState::Done
    }

    /// Apply one workflow step.
    pub fn apply(
        &mut self,
        step: Transition,
        privilege: Privilege,
        stock: &dyn StockLevels,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let next = match (self.kind, self.state, step) {
            (_, ShipmentState::Done | ShipmentState::Cancel, _) => {
                return Err(self.rejected(step));
            }
            (_, _, Transition::Cancel) => ShipmentState::Cancel,

            (ShipmentKind::Outbound, ShipmentState::Waiting, Transition::AssignTry) => {
                self.ensure_stock(stock)?;
                ShipmentState::Assigned
            }
            (ShipmentKind::Outbound, ShipmentState::Waiting, Transition::AssignForce) => {
                if !privilege.is_system() {
                    return Err(DomainError::unauthorized(
                        "forced assignment requires the system privilege",
                    ));
                }
                ShipmentState::Assigned
            }
            (ShipmentKind::Outbound, ShipmentState::Assigned, Transition::Pack) => {
                ShipmentState::Packed
            }
            (ShipmentKind::Outbound, ShipmentState::Packed, Transition::Done) => {
                ShipmentState::Done
            }

            (ShipmentKind::Return, ShipmentState::Waiting, Transition::Receive) => {
                ShipmentState::Received
            }
            (ShipmentKind::Return, ShipmentState::Received, Transition::Done) => {
                ShipmentState::Done
            }

            _ => return Err(self.rejected(step)),
        };

        self.state = next;
        self.updated_at = occurred_at;
        self.version += 1;
        Ok(())
    }

    fn ensure_stock(&self, stock: &dyn StockLevels) -> DomainResult<()> {
        for m in &self.moves {
            let available = stock.available(self.warehouse, m.product_id);
            if available < m.quantity {
                return Err(DomainError::invariant(format!(
                    "insufficient stock for product {}: {available} available, {} needed",
                    m.product_id, m.quantity
                )));
            }
        }
        Ok(())
    }

    fn rejected(&self, step: Transition) -> DomainError {
        DomainError::invariant(format!(
            "cannot apply {step:?} to {:?} shipment in state {:?}",
            self.kind, self.state
        ))
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
