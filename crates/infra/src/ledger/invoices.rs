//! Generic invoicing workflow, shipment-driven invoicing and order completion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use forgepos_core::{DomainError, DomainResult, InvoiceId, LineId, OrderId};
use forgepos_fulfillment::{Shipment, ShipmentKind, ShipmentState};
use forgepos_invoicing::{
    Invoice, InvoiceLine, InvoiceState, InvoiceType, InvoiceWorkflow, NewInvoice,
    create_invoice,
};
use forgepos_sales::{InvoiceMethod, Line, Order, OrderState, SalesLedger, ShipmentMethod};

use super::pricing::{checked_sum, line_tax};
use super::shipments::{owed_for, shipped_quantities};
use super::InMemoryLedger;

fn shipment_kind(kind: InvoiceType) -> ShipmentKind {
    match kind {
        InvoiceType::OutInvoice => ShipmentKind::Outbound,
        InvoiceType::OutCreditNote => ShipmentKind::Return,
    }
}

fn invoice_type(kind: ShipmentKind) -> InvoiceType {
    match kind {
        ShipmentKind::Outbound => InvoiceType::OutInvoice,
        ShipmentKind::Return => InvoiceType::OutCreditNote,
    }
}

/// Quantity per line already on non-cancelled invoices of `kind`.
fn invoiced_quantities(
    invoices: &[Invoice],
    order: OrderId,
    kind: InvoiceType,
) -> HashMap<LineId, i64> {
    let mut totals = HashMap::new();
    for invoice in invoices {
        if invoice.order_id() != order
            || invoice.kind() != kind
            || invoice.state() == InvoiceState::Cancel
        {
            continue;
        }
        for l in invoice.lines() {
            *totals.entry(l.line_id).or_insert(0) += l.quantity;
        }
    }
    totals
}

/// Quantity of `line` that may be invoiced as `kind` under the order's method.
fn invoiceable(
    order: &Order,
    line: &Line,
    kind: InvoiceType,
    shipped: &HashMap<LineId, i64>,
) -> i64 {
    let owed = owed_for(line, shipment_kind(kind));
    if owed == 0 {
        return 0;
    }
    match order.invoice_method() {
        InvoiceMethod::Manual => 0,
        InvoiceMethod::Order => owed,
        InvoiceMethod::Shipment => shipped.get(&line.id).copied().unwrap_or(0).min(owed),
    }
}

impl InvoiceWorkflow for InMemoryLedger {
    fn create_invoice(
        &self,
        order: &Order,
        kind: InvoiceType,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Option<Invoice>> {
        let mut state = self.write()?;
        let order = state.order(order.id_typed())?.clone();

        let shipped =
            shipped_quantities(&state.shipments, order.id_typed(), shipment_kind(kind), true);
        let invoiced = invoiced_quantities(&state.invoices, order.id_typed(), kind);

        let mut lines = Vec::new();
        let mut tax_amount = 0;
        for line in order.lines() {
            let quantity = invoiceable(&order, line, kind, &shipped)
                - invoiced.get(&line.id).copied().unwrap_or(0);
            if quantity <= 0 {
                continue;
            }
            let amount = quantity
                .checked_mul(line.unit_price)
                .ok_or_else(|| DomainError::validation("invoice line amount overflows"))?;
            tax_amount = checked_sum(
                [Ok(tax_amount), line_tax(amount, &line.taxes, &state.taxes)],
                "invoice tax amount",
            )?;
            lines.push(InvoiceLine {
                line_id: line.id,
                product_id: line.product_id,
                quantity,
                unit_price: line.unit_price,
                amount,
            });
        }
        if lines.is_empty() {
            return Ok(None);
        }

        let invoice = Invoice::create(
            InvoiceId::new(),
            NewInvoice {
                kind,
                order_id: order.id_typed(),
                party_id: order.party_id(),
                currency: order.currency().to_string(),
                lines,
                tax_amount,
            },
            occurred_at,
        )?;
        state.invoices.push(invoice.clone());
        tracing::info!(
            order_id = %order.id_typed(),
            invoice_id = %invoice.id_typed(),
            ?kind,
            total = invoice.total_amount(),
            "invoice created"
        );
        Ok(Some(invoice))
    }

    fn post(&self, ids: &[InvoiceId], occurred_at: DateTime<Utc>) -> DomainResult<()> {
        let mut state = self.write()?;
        for id in ids {
            state
                .invoices
                .iter_mut()
                .find(|i| i.id_typed() == *id)
                .ok_or_else(|| DomainError::not_found(format!("invoice {id}")))?
                .post(occurred_at)?;
        }
        Ok(())
    }

    fn invoice(&self, id: InvoiceId) -> DomainResult<Invoice> {
        self.read()?
            .invoices
            .iter()
            .find(|i| i.id_typed() == id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("invoice {id}")))
    }
}

impl InMemoryLedger {
    /// Reaction to a shipment reaching `done`: invoice what was shipped when
    /// the order invoices on shipment, then try to complete the order.
    pub(super) fn on_shipment_done(
        &self,
        shipment: &Shipment,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let order = self.order(shipment.order_id())?;
        if order.invoice_method() == InvoiceMethod::Shipment {
            create_invoice(self, &order, invoice_type(shipment.kind()), occurred_at)?;
        }
        self.complete_if_settled(shipment.order_id(), occurred_at)?;
        Ok(())
    }

    /// Move a processing order to `done` once every line is fully shipped and
    /// fully invoiced, as far as its methods require.
    pub fn complete_if_settled(
        &self,
        order_id: OrderId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut state = self.write()?;
        let order = state.order(order_id)?;
        if order.state() != OrderState::Processing {
            return Ok(false);
        }

        let pending_shipment = state.shipments.iter().any(|s| {
            s.order_id() == order_id
                && !matches!(s.state(), ShipmentState::Done | ShipmentState::Cancel)
        });
        if pending_shipment {
            return Ok(false);
        }

        for kind in [ShipmentKind::Outbound, ShipmentKind::Return] {
            let invoice_kind = invoice_type(kind);
            let shipped = shipped_quantities(&state.shipments, order_id, kind, true);
            let invoiced = invoiced_quantities(&state.invoices, order_id, invoice_kind);
            for line in order.lines() {
                let owed = owed_for(line, kind);
                if owed == 0 {
                    continue;
                }
                if order.shipment_method() != ShipmentMethod::Manual
                    && shipped.get(&line.id).copied().unwrap_or(0) < owed
                {
                    return Ok(false);
                }
                if order.invoice_method() != InvoiceMethod::Manual
                    && invoiced.get(&line.id).copied().unwrap_or(0) < owed
                {
                    return Ok(false);
                }
            }
        }

        state.order_mut(order_id)?.finish(occurred_at)?;
        tracing::info!(order_id = %order_id, "order done");
        Ok(true)
    }
}
