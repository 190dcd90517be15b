//! Response shapes handed to the POS client.
//!
//! Two fixed projections exist: the live cart and the lightweight summary used by
//! the recent-orders feed. Any other audience is delegated to a fallback
//! projection when one is supplied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use forgepos_core::{AddressId, DomainResult, ImageId, LineId, OrderId, PartyId, ProductId, UnitId};

use crate::order::{FulfillmentMode, Line, Order, OrderState};
use crate::ports::{Address, AddressKind, Directory};

/// Who the projection is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Cart,
    RecentSummary,
    Other(String),
}

impl core::str::FromStr for Audience {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pos" | "cart" => Audience::Cart,
            "recent_sales" | "recent" => Audience::RecentSummary,
            other => Audience::Other(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub code: Option<String>,
    pub rec_name: String,
    pub default_image: Option<ImageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub id: UnitId,
    pub rec_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressView {
    pub id: AddressId,
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl From<Address> for AddressView {
    fn from(a: Address) -> Self {
        Self {
            id: a.id,
            name: a.name,
            street: a.street,
            city: a.city,
            zip: a.zip,
            country: a.country,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    pub id: LineId,
    pub description: Option<String>,
    pub product: ProductSummary,
    pub unit: Option<UnitSummary>,
    pub unit_price: i64,
    pub quantity: i64,
    pub amount: i64,
    pub fulfillment_mode: FulfillmentMode,
}

/// Live cart as shown on the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub party: PartyId,
    pub total_amount: i64,
    pub untaxed_amount: i64,
    pub tax_amount: i64,
    pub comment: Option<String>,
    pub state: OrderState,
    pub invoice_address: Option<AddressView>,
    pub shipment_address: Option<AddressView>,
    pub lines: Vec<CartLineView>,
}

impl CartView {
    pub fn line(&self, id: LineId) -> Option<&CartLineView> {
        self.lines.iter().find(|l| l.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: PartyId,
    pub name: String,
}

/// One row of the recent-orders feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub party: PartyRef,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Projection {
    Cart(CartView),
    RecentSummary(OrderSummary),
    Generic(JsonValue),
}

impl Projection {
    pub fn into_cart(self) -> Option<CartView> {
        match self {
            Projection::Cart(view) => Some(view),
            _ => None,
        }
    }
}

/// Serialization supplied by the surrounding framework for audiences this crate
/// does not know.
pub trait GenericProjection {
    fn project(&self, order: &Order, audience: Option<&str>) -> DomainResult<Option<JsonValue>>;
}

pub fn serialize<D: Directory + ?Sized>(
    order: &Order,
    audience: Option<&Audience>,
    directory: &D,
    fallback: Option<&dyn GenericProjection>,
) -> DomainResult<Option<Projection>> {
    match audience {
        Some(Audience::Cart) => Ok(Some(Projection::Cart(cart_view(order, directory)?))),
        Some(Audience::RecentSummary) => Ok(Some(Projection::RecentSummary(order_summary(
            order, directory,
        )?))),
        other => {
            let tag = match other {
                Some(Audience::Other(tag)) => Some(tag.as_str()),
                _ => None,
            };
            match fallback {
                Some(generic) => Ok(generic.project(order, tag)?.map(Projection::Generic)),
                None => Ok(None),
            }
        }
    }
}

pub fn cart_view<D: Directory + ?Sized>(order: &Order, directory: &D) -> DomainResult<CartView> {
    let totals = order.totals();
    let invoice_address =
        resolve_address(order.invoice_address(), order, AddressKind::Invoice, directory)?;
    let shipment_address =
        resolve_address(order.shipment_address(), order, AddressKind::Delivery, directory)?;

    let lines = order
        .lines()
        .iter()
        .map(|line| cart_line_view(line, directory))
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(CartView {
        party: order.party_id(),
        total_amount: totals.total_amount,
        untaxed_amount: totals.untaxed_amount,
        tax_amount: totals.tax_amount,
        comment: order.comment().map(str::to_string),
        state: order.state(),
        invoice_address,
        shipment_address,
        lines,
    })
}

pub fn order_summary<D: Directory + ?Sized>(
    order: &Order,
    directory: &D,
) -> DomainResult<OrderSummary> {
    let party = directory.party(order.party_id())?;
    Ok(OrderSummary {
        id: order.id_typed(),
        party: PartyRef {
            id: party.id,
            name: party.name,
        },
        total_amount: order.totals().total_amount,
        created_at: order.created_at(),
    })
}

fn cart_line_view<D: Directory + ?Sized>(line: &Line, directory: &D) -> DomainResult<CartLineView> {
    let product = directory.product(line.product_id)?;
    let unit = match line.unit_id {
        Some(unit_id) => {
            let unit = directory.unit(unit_id)?;
            Some(UnitSummary {
                id: unit.id,
                rec_name: unit.name,
            })
        }
        None => None,
    };

    Ok(CartLineView {
        id: line.id,
        description: line.description.clone(),
        product: ProductSummary {
            id: product.id,
            rec_name: product.rec_name(),
            code: product.code,
            default_image: product.default_image,
        },
        unit,
        unit_price: line.unit_price,
        quantity: line.quantity,
        amount: line.amount,
        fulfillment_mode: line.fulfillment_mode,
    })
}

/// Explicit address on the order, else the party's first address of `kind`.
fn resolve_address<D: Directory + ?Sized>(
    explicit: Option<AddressId>,
    order: &Order,
    kind: AddressKind,
    directory: &D,
) -> DomainResult<Option<AddressView>> {
    let address = match explicit {
        Some(id) => Some(directory.address(id)?),
        None => directory.first_address(order.party_id(), kind)?,
    };
    Ok(address.map(AddressView::from))
}
