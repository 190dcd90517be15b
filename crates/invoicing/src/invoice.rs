use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{
    AggregateRoot, DomainError, DomainResult, InvoiceId, LineId, OrderId, PartyId, ProductId,
};

/// Customer invoice or credit note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    OutInvoice,
    OutCreditNote,
}

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceState {
    Draft,
    Posted,
    Paid,
    Cancel,
}

/// Invoice line derived from an order line. Quantity is positive; credit notes
/// carry the returned quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub kind: InvoiceType,
    pub order_id: OrderId,
    pub party_id: PartyId,
    pub currency: String,
    pub lines: Vec<InvoiceLine>,
    pub tax_amount: i64,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    kind: InvoiceType,
    order_id: OrderId,
    party_id: PartyId,
    currency: String,
    lines: Vec<InvoiceLine>,
    untaxed_amount: i64,
    tax_amount: i64,
    state: InvoiceState,
    created_at: DateTime<Utc>,
    posted_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Invoice {
    pub fn create(id: InvoiceId, new: NewInvoice, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        if new.lines.is_empty() {
            return Err(DomainError::validation("invoice must have at least one line"));
        }
        if new.lines.iter().any(|l| l.quantity <= 0) {
            return Err(DomainError::validation("invoice line quantity must be positive"));
        }

        let untaxed_amount = new
            .lines
            .iter()
            .try_fold(0i64, |acc, l| acc.checked_add(l.amount))
            .ok_or_else(|| DomainError::validation("invoice untaxed amount overflows"))?;
        if untaxed_amount.checked_add(new.tax_amount).is_none() {
            return Err(DomainError::validation("invoice total overflows"));
        }
        Ok(Self {
            id,
            kind: new.kind,
            order_id: new.order_id,
            party_id: new.party_id,
            currency: new.currency,
            lines: new.lines,
            untaxed_amount,
            tax_amount: new.tax_amount,
            state: InvoiceState::Draft,
            created_at: occurred_at,
            posted_at: None,
            version: 1,
        })
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn kind(&self) -> InvoiceType {
        self.kind
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn party_id(&self) -> PartyId {
        self.party_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn state(&self) -> InvoiceState {
        self.state
    }

    pub fn untaxed_amount(&self) -> i64 {
        self.untaxed_amount
    }

    pub fn tax_amount(&self) -> i64 {
        self.tax_amount
    }

    pub fn total_amount(&self) -> i64 {
        self.untaxed_amount + self.tax_amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    /// Draft → posted. Posting a posted invoice is a no-op.
    pub fn post(&mut self, occurred_at: DateTime<Utc>) -> DomainResult<()> {
        match self.state {
            InvoiceState::Posted => Ok(()),
            InvoiceState::Draft => {
                self.state = InvoiceState::Posted;
                self.posted_at = Some(occurred_at);
                self.version += 1;
                Ok(())
            }
            other => Err(DomainError::invariant(format!(
                "cannot post invoice in state {other:?}"
            ))),
        }
    }

    pub fn pay(&mut self) -> DomainResult<()> {
        if self.state != InvoiceState::Posted {
            return Err(DomainError::invariant("only posted invoices can be paid"));
        }
        self.state = InvoiceState::Paid;
        self.version += 1;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        if self.state != InvoiceState::Draft {
            return Err(DomainError::invariant("only draft invoices can be cancelled"));
        }
        self.state = InvoiceState::Cancel;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn new_invoice(lines: Vec<InvoiceLine>) -> NewInvoice {
        NewInvoice {
            kind: InvoiceType::OutInvoice,
            order_id: OrderId::new(),
            party_id: PartyId::new(),
            currency: "USD".to_string(),
            lines,
            tax_amount: 20,
        }
    }

    fn single_line() -> InvoiceLine {
        InvoiceLine {
            line_id: LineId::new(),
            product_id: ProductId::new(),
            quantity: 2,
            unit_price: 100,
            amount: 200,
        }
    }

    #[test]
    fn created_invoice_is_draft_with_totals() {
        let invoice =
            Invoice::create(InvoiceId::new(), new_invoice(vec![single_line()]), test_time()).unwrap();
        assert_eq!(invoice.state(), InvoiceState::Draft);
        assert_eq!(invoice.untaxed_amount(), 200);
        assert_eq!(invoice.total_amount(), 220);
        assert_eq!(invoice.posted_at(), None);
    }

    #[test]
    fn cannot_create_empty_invoice() {
        let err = Invoice::create(InvoiceId::new(), new_invoice(vec![]), test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let mut huge = single_line();
        huge.amount = i64::MAX;
        let err = Invoice::create(
            InvoiceId::new(),
            new_invoice(vec![huge.clone(), single_line()]),
            test_time(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = Invoice::create(InvoiceId::new(), new_invoice(vec![huge]), test_time()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn post_then_pay() {
        let mut invoice =
            Invoice::create(InvoiceId::new(), new_invoice(vec![single_line()]), test_time()).unwrap();
        invoice.post(test_time()).unwrap();
        invoice.post(test_time()).unwrap();
        assert_eq!(invoice.state(), InvoiceState::Posted);
        assert_eq!(invoice.version(), 2);

        assert!(invoice.cancel().is_err());
        invoice.pay().unwrap();
        assert_eq!(invoice.state(), InvoiceState::Paid);
        assert!(invoice.post(test_time()).is_err());
    }
}
