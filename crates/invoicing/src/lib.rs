//! Invoicing domain module: customer invoices and the finalizer that posts the
//! invoices produced by shipment completion.
//!
//! Deterministic domain logic only (no IO, no storage).

pub mod finalize;
pub mod invoice;
pub mod ports;

pub use finalize::create_invoice;
pub use invoice::{Invoice, InvoiceLine, InvoiceState, InvoiceType, NewInvoice};
pub use ports::InvoiceWorkflow;
