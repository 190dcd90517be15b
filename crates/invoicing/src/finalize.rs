//! Posts the customer invoices that fall out of shipment completion.

use chrono::{DateTime, Utc};

use forgepos_core::DomainResult;
use forgepos_sales::{InvoiceMethod, Order};

use crate::invoice::{Invoice, InvoiceType};
use crate::ports::InvoiceWorkflow;

/// Create the invoice of `kind` for `order`.
///
/// Under the `shipment` invoice method a customer invoice is posted at once
/// and returned as re-read after posting. Credit notes and other methods come
/// back as the workflow produced them.
pub fn create_invoice<W: InvoiceWorkflow + ?Sized>(
    workflow: &W,
    order: &Order,
    kind: InvoiceType,
    occurred_at: DateTime<Utc>,
) -> DomainResult<Option<Invoice>> {
    let Some(invoice) = workflow.create_invoice(order, kind, occurred_at)? else {
        return Ok(None);
    };

    if order.invoice_method() == InvoiceMethod::Shipment && kind == InvoiceType::OutInvoice {
        let id = invoice.id_typed();
        workflow.post(&[id], occurred_at)?;
        tracing::info!(order_id = %order.id_typed(), invoice_id = %id, "invoice posted");
        return workflow.invoice(id).map(Some);
    }

    Ok(Some(invoice))
}
