//! Application facade used by the POS front end.
//!
//! Every operation runs inside one ledger transaction and maps domain errors
//! into [`PosError`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use forgepos_core::{DomainResult, OrderId, Privilege, ShipmentId, ShopId};
use forgepos_fulfillment::{Shipment, ShipmentKind, ShipmentWorkflow, Transition};
use forgepos_invoicing::{Invoice, InvoiceType};
use forgepos_sales::{
    AddProduct, Audience, CartMutation, CartView, GenericProjection, InvoiceMethod, NewOrder,
    Order, OrderSummary, Projection, SalesLedger,
};

use crate::config::PosConfig;
use crate::error::PosError;
use crate::ledger::InMemoryLedger;

/// What [`PosService::process`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub order: OrderId,
    pub shipments: Vec<Shipment>,
    pub invoices: Vec<Invoice>,
}

#[derive(Debug)]
pub struct PosService {
    ledger: Arc<InMemoryLedger>,
    config: PosConfig,
}

impl PosService {
    /// Registers the configured shops with `ledger`.
    pub fn new(ledger: Arc<InMemoryLedger>, config: PosConfig) -> Result<Self, PosError> {
        for shop in &config.shops {
            ledger.add_shop(shop.clone())?;
        }
        Ok(Self { ledger, config })
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn config(&self) -> &PosConfig {
        &self.config
    }

    pub fn order(&self, id: OrderId) -> Result<Order, PosError> {
        Ok(self.ledger.order(id)?)
    }

    /// Open a cart for the shop's anonymous customer.
    pub fn create_walk_in_order(
        &self,
        shop: ShopId,
        currency: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<OrderId, PosError> {
        self.ledger.transaction(|ledger| {
            let shop = ledger.shop(shop)?;
            Ok(ledger.open_order(NewOrder::walk_in(&shop, currency), occurred_at)?)
        })
    }

    pub fn create_order(&self, new: NewOrder, occurred_at: DateTime<Utc>) -> Result<OrderId, PosError> {
        self.ledger
            .transaction(|ledger| Ok(ledger.open_order(new, occurred_at)?))
    }

    pub fn add_product(&self, cmd: AddProduct) -> Result<CartMutation, PosError> {
        let _span = tracing::info_span!(
            "add_product",
            order_id = %cmd.order_id,
            product_id = %cmd.product_id,
            quantity = cmd.quantity
        )
        .entered();

        self.ledger.transaction(|ledger| {
            Ok(forgepos_sales::add_product(ledger, ledger, ledger, &cmd)?)
        })
    }

    pub fn serialize_for_pos(&self, order: OrderId) -> Result<CartView, PosError> {
        let order = self.ledger.order(order)?;
        Ok(forgepos_sales::cart_view(&order, self.ledger.as_ref())?)
    }

    pub fn serialize(
        &self,
        order: OrderId,
        audience: Option<&Audience>,
        fallback: Option<&dyn GenericProjection>,
    ) -> Result<Option<Projection>, PosError> {
        let order = self.ledger.order(order)?;
        Ok(forgepos_sales::serialize(&order, audience, self.ledger.as_ref(), fallback)?)
    }

    pub fn recent_open_orders(
        &self,
        shop: ShopId,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderSummary>, PosError> {
        Ok(forgepos_sales::recent_open_orders(
            self.ledger.as_ref(),
            self.ledger.as_ref(),
            shop,
            now,
            self.config.recent_window(),
        )?)
    }

    pub fn quote(&self, order: OrderId, occurred_at: DateTime<Utc>) -> Result<Order, PosError> {
        self.ledger
            .transaction(|ledger| Ok(ledger.update_order(order, |o| o.quote(occurred_at))?))
    }

    pub fn confirm(&self, order: OrderId, occurred_at: DateTime<Utc>) -> Result<Order, PosError> {
        self.ledger
            .transaction(|ledger| Ok(ledger.update_order(order, |o| o.confirm(occurred_at))?))
    }

    pub fn cancel(&self, order: OrderId, occurred_at: DateTime<Utc>) -> Result<Order, PosError> {
        self.ledger
            .transaction(|ledger| Ok(ledger.update_order(order, |o| o.cancel(occurred_at))?))
    }

    /// Start processing a confirmed order: invoices first (when invoiced on
    /// order), then shipments with the pick-up fast path.
    pub fn process(&self, order: OrderId, occurred_at: DateTime<Utc>) -> Result<ProcessOutcome, PosError> {
        let _span = tracing::info_span!("process", order_id = %order).entered();

        self.ledger
            .transaction(|ledger| Ok(process_order(ledger, ledger, order, occurred_at)?))
    }

    /// Regular (non fast-path) handling of shipments: assign against stock,
    /// pack, then complete.
    pub fn ship(&self, shipments: &[ShipmentId], occurred_at: DateTime<Utc>) -> Result<Vec<Shipment>, PosError> {
        self.ledger.transaction(|ledger| {
            for step in [Transition::AssignTry, Transition::Pack, Transition::Done] {
                ledger.transition(shipments, step, Privilege::Standard, occurred_at)?;
            }
            Ok(ledger.shipments(shipments)?)
        })
    }

    pub fn order_shipments(&self, order: OrderId) -> Result<Vec<Shipment>, PosError> {
        Ok(self.ledger.order_shipments(order)?)
    }

    pub fn order_invoices(&self, order: OrderId) -> Result<Vec<Invoice>, PosError> {
        Ok(self.ledger.order_invoices(order)?)
    }
}

/// Body of [`PosService::process`], run on a transaction's ledger. Shipment
/// creation and the fast path go through `shipments`.
pub(crate) fn process_order(
    ledger: &InMemoryLedger,
    shipments: &dyn ShipmentWorkflow,
    order: OrderId,
    occurred_at: DateTime<Utc>,
) -> DomainResult<ProcessOutcome> {
    let processing = ledger.update_order(order, |o| o.start_processing(occurred_at))?;

    if processing.invoice_method() == InvoiceMethod::Order {
        for kind in [InvoiceType::OutInvoice, InvoiceType::OutCreditNote] {
            forgepos_invoicing::create_invoice(ledger, &processing, kind, occurred_at)?;
        }
    }
    for kind in [ShipmentKind::Outbound, ShipmentKind::Return] {
        forgepos_fulfillment::create_shipments(shipments, &processing, kind, occurred_at)?;
    }
    ledger.complete_if_settled(order, occurred_at)?;

    tracing::info!(order_id = %order, "order processed");
    Ok(ProcessOutcome {
        order,
        shipments: ledger.order_shipments(order)?,
        invoices: ledger.order_invoices(order)?,
    })
}
