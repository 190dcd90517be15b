//! Interfaces of the surrounding ledger the sales logic relies on.
//!
//! The ledger owns persistence, pricing and master data. Implementations must run
//! each public sales operation inside one transaction: either every write of the
//! call is kept or none is. Two concurrent cart mutations on the same draft order
//! must be serialized by the implementation (or rejected), otherwise the
//! find-or-create step of [`crate::cart::add_product`] can produce duplicate lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{
    AddressId, DomainResult, ImageId, LineId, OrderId, PartyId, PriceListId, ProductId, ShopId,
    TaxId, UnitId,
};

use crate::order::{FulfillmentMode, Line, Order};

/// Filter for [`SalesLedger::search_lines`]. `None` fields do not constrain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineQuery {
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub fulfillment_mode: Option<FulfillmentMode>,
}

impl LineQuery {
    pub fn matches(&self, line: &Line) -> bool {
        line.order_id == self.order_id
            && self.product_id.is_none_or(|p| line.product_id == p)
            && self.fulfillment_mode.is_none_or(|m| line.fulfillment_mode == m)
    }
}

/// Fields written when a line is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: i64,
    pub amount: i64,
    /// `None` lets the ledger apply the shop's default mode.
    pub fulfillment_mode: Option<FulfillmentMode>,
}

/// Partial update of a line. The product is deliberately absent: an existing
/// line never changes product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineWrite {
    pub quantity: Option<i64>,
    pub fulfillment_mode: Option<FulfillmentMode>,
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
    pub unit_price: Option<i64>,
    pub amount: Option<i64>,
}

/// Parent order values visible to a derivation, read when the draft is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSnapshot {
    pub currency: String,
    pub party_id: PartyId,
    pub price_list: Option<PriceListId>,
}

/// In-flight line handed to the derivation hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDraft {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Option<i64>,
    pub fulfillment_mode: FulfillmentMode,
    pub parent: ParentSnapshot,
}

impl LineDraft {
    pub fn from_line(line: &Line, parent: ParentSnapshot) -> Self {
        Self {
            order_id: line.order_id,
            product_id: line.product_id,
            unit_id: line.unit_id,
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price: Some(line.unit_price),
            fulfillment_mode: line.fulfillment_mode,
            parent,
        }
    }

    /// Feed a derivation's line-scoped output back into the draft.
    pub fn apply(&mut self, derivation: &Derivation) {
        let changes = &derivation.line;
        if let Some(unit) = changes.unit_id {
            self.unit_id = Some(unit);
        }
        if let Some(description) = &changes.description {
            self.description = Some(description.clone());
        }
        if let Some(price) = changes.unit_price {
            self.unit_price = Some(price);
        }
    }
}

/// Line-scoped derived values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineChanges {
    pub unit_id: Option<UnitId>,
    pub description: Option<String>,
    pub unit_price: Option<i64>,
    pub amount: Option<i64>,
}

impl LineChanges {
    fn merge(&mut self, later: LineChanges) {
        if later.unit_id.is_some() {
            self.unit_id = later.unit_id;
        }
        if later.description.is_some() {
            self.description = later.description;
        }
        if later.unit_price.is_some() {
            self.unit_price = later.unit_price;
        }
        if later.amount.is_some() {
            self.amount = later.amount;
        }
    }
}

/// Output of a derivation hook.
///
/// Line fields, parent-scoped values and the tax set are kept apart: only
/// `line` is written through the generic field path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Derivation {
    pub line: LineChanges,
    pub parent: Option<ParentSnapshot>,
    pub taxes: Option<Vec<TaxId>>,
}

impl Derivation {
    /// Combine two hook outputs; values from `later` win.
    pub fn merge(mut self, later: Derivation) -> Derivation {
        self.line.merge(later.line);
        if later.parent.is_some() {
            self.parent = later.parent;
        }
        if later.taxes.is_some() {
            self.taxes = later.taxes;
        }
        self
    }
}

/// Order and line persistence.
pub trait SalesLedger {
    fn order(&self, id: OrderId) -> DomainResult<Order>;

    fn line(&self, id: LineId) -> DomainResult<Line>;

    fn search_lines(&self, query: &LineQuery) -> DomainResult<Vec<LineId>>;

    fn create_line(&self, line: NewLine, occurred_at: DateTime<Utc>) -> DomainResult<LineId>;

    fn write_line(
        &self,
        id: LineId,
        write: &LineWrite,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Replace the tax set of a line (relational, outside the field write path).
    fn set_line_taxes(
        &self,
        id: LineId,
        taxes: &[TaxId],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Every order owned by `shop`, any state.
    fn shop_orders(&self, shop: ShopId) -> DomainResult<Vec<Order>>;
}

/// Recompute hooks for a line (pricing, units, taxes).
pub trait LineDerivation {
    fn on_product_change(&self, draft: &LineDraft) -> DomainResult<Derivation>;

    fn on_quantity_change(&self, draft: &LineDraft) -> DomainResult<Derivation>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub code: Option<String>,
    pub name: String,
    pub default_image: Option<ImageId>,
    pub default_unit: UnitId,
    /// Price in smallest currency unit.
    pub list_price: i64,
    pub taxes: Vec<TaxId>,
}

impl ProductInfo {
    /// Display name: `[CODE] Name` when a code exists.
    pub fn rec_name(&self) -> String {
        match &self.code {
            Some(code) => format!("[{code}] {}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: UnitId,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub id: PartyId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Invoice,
    Delivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub party_id: PartyId,
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub invoice: bool,
    pub delivery: bool,
}

impl Address {
    pub fn is_kind(&self, kind: AddressKind) -> bool {
        match kind {
            AddressKind::Invoice => self.invoice,
            AddressKind::Delivery => self.delivery,
        }
    }
}

/// Master data lookups.
pub trait Directory {
    fn product(&self, id: ProductId) -> DomainResult<ProductInfo>;

    fn unit(&self, id: UnitId) -> DomainResult<UnitInfo>;

    fn party(&self, id: PartyId) -> DomainResult<PartyInfo>;

    fn address(&self, id: AddressId) -> DomainResult<Address>;

    /// First address of `party` flagged for `kind`, in the party's own order.
    fn first_address(&self, party: PartyId, kind: AddressKind) -> DomainResult<Option<Address>>;
}
