//! Cart mutation: scanning or adding a product to an open order.
//!
//! A product is absorbed by exactly one line per `(order, product, fulfillment
//! mode)`. The quantity passed in is the line's new absolute quantity, not a
//! delta, so repeating a scan with the same quantity is idempotent.

use chrono::{DateTime, Utc};
use serde::Serialize;

use forgepos_core::{DomainError, DomainResult, LineId, OrderId, ProductId, ShopId, TaxId};

use crate::order::{FulfillmentMode, Line, Order};
use crate::ports::{
    Directory, LineDerivation, LineDraft, LineQuery, LineWrite, NewLine, SalesLedger,
};
use crate::view::{CartView, cart_view};

/// Explicit call context of a cart mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartContext {
    /// Active shop of the POS session.
    pub shop: Option<ShopId>,
    /// Update this line instead of searching for one.
    pub target_line: Option<LineId>,
    /// Requested mode; the cart defaults to pick-up.
    pub fulfillment_mode: Option<FulfillmentMode>,
}

impl CartContext {
    pub fn for_shop(shop: ShopId) -> Self {
        Self {
            shop: Some(shop),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: FulfillmentMode) -> Self {
        self.fulfillment_mode = Some(mode);
        self
    }

    pub fn with_target_line(mut self, line: LineId) -> Self {
        self.target_line = Some(line);
        self
    }

    fn effective_mode(&self) -> FulfillmentMode {
        self.fulfillment_mode.unwrap_or(FulfillmentMode::PickUp)
    }
}

/// Command: AddProduct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddProduct {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub context: CartContext,
    pub occurred_at: DateTime<Utc>,
}

/// Result of a cart mutation: the refreshed cart plus the line that absorbed
/// the product, so the client never needs a follow-up read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartMutation {
    pub order: CartView,
    pub updated_line_id: LineId,
}

pub fn add_product<L, H, D>(
    ledger: &L,
    derivation: &H,
    directory: &D,
    cmd: &AddProduct,
) -> DomainResult<CartMutation>
where
    L: SalesLedger + ?Sized,
    H: LineDerivation + ?Sized,
    D: Directory + ?Sized,
{
    let order = ledger.order(cmd.order_id)?;
    ensure_shop(&order, &cmd.context)?;
    if !order.is_modifiable() {
        return Err(DomainError::invariant(
            "cannot add products to an order that left draft",
        ));
    }

    let (line_id, taxes) = match resolve_line(ledger, &order, cmd)? {
        Some(line) => update_line(ledger, derivation, &order, &line, cmd)?,
        None => create_line(ledger, derivation, &order, cmd)?,
    };

    if let Some(taxes) = taxes {
        ledger.set_line_taxes(line_id, &taxes, cmd.occurred_at)?;
    }

    let order = ledger.order(cmd.order_id)?;
    Ok(CartMutation {
        order: cart_view(&order, directory)?,
        updated_line_id: line_id,
    })
}

fn ensure_shop(order: &Order, context: &CartContext) -> DomainResult<()> {
    let shop = context
        .shop
        .ok_or_else(|| DomainError::missing_context("shop"))?;
    if shop != order.shop_id() {
        return Err(DomainError::invariant(format!(
            "order {} belongs to another shop",
            order.id_typed()
        )));
    }
    Ok(())
}

fn resolve_line<L: SalesLedger + ?Sized>(
    ledger: &L,
    order: &Order,
    cmd: &AddProduct,
) -> DomainResult<Option<Line>> {
    if let Some(target) = cmd.context.target_line {
        let line = ledger.line(target)?;
        if line.order_id != order.id_typed() {
            return Err(DomainError::invariant(format!(
                "line {target} belongs to another order"
            )));
        }
        return Ok(Some(line));
    }

    let query = LineQuery {
        order_id: order.id_typed(),
        product_id: Some(cmd.product_id),
        fulfillment_mode: cmd.context.fulfillment_mode,
    };
    let ids = ledger.search_lines(&query)?;
    match ids.as_slice() {
        [] => Ok(None),
        [id] => ledger.line(*id).map(Some),
        many => {
            tracing::warn!(
                order_id = %order.id_typed(),
                product_id = %cmd.product_id,
                matches = many.len(),
                "ambiguous line match; adding a new line instead"
            );
            Ok(None)
        }
    }
}

fn update_line<L, H>(
    ledger: &L,
    derivation: &H,
    order: &Order,
    line: &Line,
    cmd: &AddProduct,
) -> DomainResult<(LineId, Option<Vec<TaxId>>)>
where
    L: SalesLedger + ?Sized,
    H: LineDerivation + ?Sized,
{
    let mode = cmd.context.effective_mode();
    if line.product_id != cmd.product_id {
        tracing::debug!(
            line_id = %line.id,
            requested = %cmd.product_id,
            kept = %line.product_id,
            "target line keeps its product"
        );
    }

    let mut draft = LineDraft::from_line(line, order.parent_snapshot());
    draft.quantity = cmd.quantity;
    draft.fulfillment_mode = mode;
    let derived = derivation.on_quantity_change(&draft)?;

    let write = LineWrite {
        quantity: Some(cmd.quantity),
        fulfillment_mode: Some(mode),
        unit_id: derived.line.unit_id.or(line.unit_id),
        description: derived.line.description,
        unit_price: derived.line.unit_price,
        amount: derived.line.amount,
    };
    ledger.write_line(line.id, &write, cmd.occurred_at)?;

    tracing::info!(
        order_id = %order.id_typed(),
        line_id = %line.id,
        quantity = cmd.quantity,
        fulfillment_mode = %mode,
        "cart line updated"
    );
    Ok((line.id, derived.taxes))
}

fn create_line<L, H>(
    ledger: &L,
    derivation: &H,
    order: &Order,
    cmd: &AddProduct,
) -> DomainResult<(LineId, Option<Vec<TaxId>>)>
where
    L: SalesLedger + ?Sized,
    H: LineDerivation + ?Sized,
{
    let mode = cmd.context.effective_mode();
    let mut draft = LineDraft {
        order_id: order.id_typed(),
        product_id: cmd.product_id,
        unit_id: None,
        description: None,
        quantity: cmd.quantity,
        unit_price: None,
        fulfillment_mode: mode,
        parent: order.parent_snapshot(),
    };

    let on_product = derivation.on_product_change(&draft)?;
    draft.apply(&on_product);
    let on_quantity = derivation.on_quantity_change(&draft)?;
    let merged = on_product.merge(on_quantity);

    let unit_price = merged.line.unit_price.ok_or_else(|| {
        DomainError::validation(format!("no unit price derived for product {}", cmd.product_id))
    })?;
    let amount = match merged.line.amount {
        Some(amount) => amount,
        None => cmd
            .quantity
            .checked_mul(unit_price)
            .ok_or_else(|| DomainError::invariant("line amount overflow"))?,
    };

    let id = ledger.create_line(
        NewLine {
            order_id: order.id_typed(),
            product_id: cmd.product_id,
            unit_id: merged.line.unit_id,
            description: merged.line.description,
            quantity: cmd.quantity,
            unit_price,
            amount,
            fulfillment_mode: Some(mode),
        },
        cmd.occurred_at,
    )?;

    tracing::info!(
        order_id = %order.id_typed(),
        line_id = %id,
        product_id = %cmd.product_id,
        quantity = cmd.quantity,
        fulfillment_mode = %mode,
        "cart line created"
    );
    Ok((id, merged.taxes))
}
