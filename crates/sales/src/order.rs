use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{
    AddressId, AggregateRoot, DomainError, DomainResult, Entity, LineId, OrderId, PartyId,
    PriceListId, ProductId, ShopId, TaxId, UnitId, WarehouseId,
};

use crate::ports::ParentSnapshot;
use crate::shop::ShopConfig;

/// How the goods of a line reach the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMode {
    /// Customer takes the goods from shelf stock immediately.
    PickUp,
    /// Regular warehouse dispatch (possibly backordered).
    Ship,
}

impl FulfillmentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FulfillmentMode::PickUp => "pick_up",
            FulfillmentMode::Ship => "ship",
        }
    }
}

impl core::fmt::Display for FulfillmentMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for FulfillmentMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pick_up" => Ok(FulfillmentMode::PickUp),
            "ship" => Ok(FulfillmentMode::Ship),
            other => Err(DomainError::validation(format!(
                "unknown fulfillment mode '{other}' (expected pick_up or ship)"
            ))),
        }
    }
}

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Draft,
    Quotation,
    Confirmed,
    Processing,
    Done,
    Cancel,
}

/// When invoices get created for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceMethod {
    Manual,
    /// On processing, for all lines.
    Order,
    /// Each time a shipment is completed, for the shipped quantities.
    Shipment,
}

/// When shipments get created for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentMethod {
    Manual,
    Order,
}

/// Totals maintained by the ledger's pricing (smallest currency unit).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub untaxed_amount: i64,
    pub tax_amount: i64,
    pub total_amount: i64,
}

/// One product entry on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
    /// Signed; a negative quantity is a return.
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: i64,
    pub amount: i64,
    pub fulfillment_mode: FulfillmentMode,
    pub taxes: Vec<TaxId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Line {
    type Id = LineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Line {
    pub fn is_return(&self) -> bool {
        self.quantity < 0
    }

    /// Warehouse the line's goods leave from.
    ///
    /// Ship lines are backordered from the shop's ship-from warehouse; pick-up
    /// lines come out of the order's own warehouse.
    pub fn warehouse(&self, order: &Order, shop: &ShopConfig) -> WarehouseId {
        match self.fulfillment_mode {
            FulfillmentMode::Ship => shop.ship_from_warehouse,
            FulfillmentMode::PickUp => order.warehouse(),
        }
    }

    /// Latest activity on the line.
    pub fn activity(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.updated_at, self.created_at)
    }
}

/// Input for opening an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub shop_id: ShopId,
    pub party_id: PartyId,
    pub currency: String,
    pub price_list: Option<PriceListId>,
    pub warehouse: WarehouseId,
    pub invoice_method: InvoiceMethod,
    pub shipment_method: ShipmentMethod,
    pub invoice_address: Option<AddressId>,
    pub shipment_address: Option<AddressId>,
    pub comment: Option<String>,
}

impl NewOrder {
    /// Walk-in cart for `shop`: anonymous customer, shop warehouse, invoiced from
    /// shipments and shipped on processing.
    pub fn walk_in(shop: &ShopConfig, currency: impl Into<String>) -> Self {
        Self {
            shop_id: shop.id,
            party_id: shop.anonymous_customer,
            currency: currency.into(),
            price_list: None,
            warehouse: shop.warehouse,
            invoice_method: InvoiceMethod::Shipment,
            shipment_method: ShipmentMethod::Order,
            invoice_address: None,
            shipment_address: None,
            comment: None,
        }
    }
}

/// Aggregate root: Order (the cart / sales order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    shop_id: ShopId,
    party_id: PartyId,
    currency: String,
    price_list: Option<PriceListId>,
    warehouse: WarehouseId,
    state: OrderState,
    invoice_method: InvoiceMethod,
    shipment_method: ShipmentMethod,
    invoice_address: Option<AddressId>,
    shipment_address: Option<AddressId>,
    comment: Option<String>,
    lines: Vec<Line>,
    totals: OrderTotals,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Order {
    pub fn open(id: OrderId, new: NewOrder, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        if new.currency.trim().is_empty() {
            return Err(DomainError::validation("currency must not be empty"));
        }

        Ok(Self {
            id,
            shop_id: new.shop_id,
            party_id: new.party_id,
            currency: new.currency,
            price_list: new.price_list,
            warehouse: new.warehouse,
            state: OrderState::Draft,
            invoice_method: new.invoice_method,
            shipment_method: new.shipment_method,
            invoice_address: new.invoice_address,
            shipment_address: new.shipment_address,
            comment: new.comment,
            lines: Vec::new(),
            totals: OrderTotals::default(),
            created_at: occurred_at,
            updated_at: occurred_at,
            version: 1,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    pub fn party_id(&self) -> PartyId {
        self.party_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn price_list(&self) -> Option<PriceListId> {
        self.price_list
    }

    /// Pick-up warehouse.
    pub fn warehouse(&self) -> WarehouseId {
        self.warehouse
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn invoice_method(&self) -> InvoiceMethod {
        self.invoice_method
    }

    pub fn shipment_method(&self) -> ShipmentMethod {
        self.shipment_method
    }

    pub fn invoice_address(&self) -> Option<AddressId> {
        self.invoice_address
    }

    pub fn shipment_address(&self) -> Option<AddressId> {
        self.shipment_address
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.state, OrderState::Draft)
    }

    /// Parent values a line derivation is allowed to read, taken now.
    pub fn parent_snapshot(&self) -> ParentSnapshot {
        ParentSnapshot {
            currency: self.currency.clone(),
            party_id: self.party_id,
            price_list: self.price_list,
        }
    }

    /// Most recent `(updated_at, created_at)` among the lines, if any.
    pub fn latest_line_activity(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.lines.iter().map(Line::activity).max()
    }

    // ---- mutations used by ledgers ----

    pub fn insert_line(&mut self, line: Line) -> DomainResult<()> {
        self.ensure_modifiable()?;
        if line.order_id != self.id {
            return Err(DomainError::invariant("line belongs to another order"));
        }
        if self.line(line.id).is_some() {
            return Err(DomainError::conflict(format!("line {} already exists", line.id)));
        }
        self.lines.push(line);
        self.version += 1;
        Ok(())
    }

    /// Edit one line in place. The version only moves when `f` succeeds.
    pub fn update_line<T>(
        &mut self,
        id: LineId,
        f: impl FnOnce(&mut Line) -> DomainResult<T>,
    ) -> DomainResult<T> {
        self.ensure_modifiable()?;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| DomainError::not_found(format!("line {id}")))?;
        let value = f(line)?;
        self.version += 1;
        Ok(value)
    }

    pub fn set_totals(&mut self, totals: OrderTotals) {
        self.totals = totals;
    }

    pub fn quote(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if self.state != OrderState::Draft {
            return Err(DomainError::invariant("only draft orders can be quoted"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot quote order without lines"));
        }
        self.transition(OrderState::Quotation, occurred_at);
        Ok(())
    }

    pub fn confirm(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if self.state != OrderState::Quotation {
            return Err(DomainError::invariant("only quoted orders can be confirmed"));
        }
        self.transition(OrderState::Confirmed, occurred_at);
        Ok(())
    }

    pub fn start_processing(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if self.state != OrderState::Confirmed {
            return Err(DomainError::invariant("only confirmed orders can be processed"));
        }
        self.transition(OrderState::Processing, occurred_at);
        Ok(())
    }

    pub fn finish(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if self.state != OrderState::Processing {
            return Err(DomainError::invariant("only processing orders can be done"));
        }
        self.transition(OrderState::Done, occurred_at);
        Ok(())
    }

    pub fn cancel(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        if !matches!(self.state, OrderState::Draft | OrderState::Quotation) {
            return Err(DomainError::invariant(
                "only draft or quoted orders can be cancelled",
            ));
        }
        self.transition(OrderState::Cancel, occurred_at);
        Ok(())
    }

    fn transition(&mut self, state: OrderState, occurred_at: DateTime<Utc>) {
        self.state = state;
        self.updated_at = occurred_at;
        self.version += 1;
    }

    fn ensure_modifiable(&self) -> DomainResult<()> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify order lines once it left draft",
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
