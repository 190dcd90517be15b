use chrono::{DateTime, Utc};

use forgepos_core::{DomainResult, InvoiceId};
use forgepos_sales::Order;

use crate::invoice::{Invoice, InvoiceType};

/// Generic invoicing workflow of the ledger.
pub trait InvoiceWorkflow {
    /// Invoice whatever `order` still owes for `kind`. `None` when nothing is
    /// left to invoice.
    fn create_invoice(
        &self,
        order: &Order,
        kind: InvoiceType,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Option<Invoice>>;

    fn post(&self, ids: &[InvoiceId], occurred_at: DateTime<Utc>) -> DomainResult<()>;

    fn invoice(&self, id: InvoiceId) -> DomainResult<Invoice>;
}
