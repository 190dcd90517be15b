//! Price lookup, tax computation and the line derivation hooks.

use std::collections::HashMap;

use forgepos_core::{DomainError, DomainResult, OrderId, PriceListId, ProductId, TaxId};
use forgepos_sales::{Derivation, LineChanges, LineDerivation, LineDraft, OrderTotals};

use super::{InMemoryLedger, LedgerState, TaxRate};

fn overflow(what: &str) -> DomainError {
    DomainError::validation(format!("{what} overflows"))
}

/// Sum of `values`, failing instead of wrapping.
pub(super) fn checked_sum(
    values: impl IntoIterator<Item = DomainResult<i64>>,
    what: &str,
) -> DomainResult<i64> {
    values.into_iter().try_fold(0i64, |acc, v| {
        acc.checked_add(v?).ok_or_else(|| overflow(what))
    })
}

/// Tax owed on `amount` for `taxes`, each truncated toward zero.
pub(super) fn line_tax(
    amount: i64,
    taxes: &[TaxId],
    rates: &HashMap<TaxId, TaxRate>,
) -> DomainResult<i64> {
    checked_sum(
        taxes.iter().filter_map(|t| rates.get(t)).map(|rate| {
            amount
                .checked_mul(rate.rate_bp)
                .map(|scaled| scaled / 10_000)
                .ok_or_else(|| overflow("tax amount"))
        }),
        "tax amount",
    )
}

pub(super) fn recompute_totals(state: &mut LedgerState, order_id: OrderId) -> DomainResult<()> {
    let order = state.order(order_id)?;
    let untaxed_amount = checked_sum(order.lines().iter().map(|l| Ok(l.amount)), "untaxed amount")?;
    let tax_amount = checked_sum(
        order
            .lines()
            .iter()
            .map(|l| line_tax(l.amount, &l.taxes, &state.taxes)),
        "tax amount",
    )?;
    let total_amount = untaxed_amount
        .checked_add(tax_amount)
        .ok_or_else(|| overflow("order total"))?;

    state.order_mut(order_id)?.set_totals(OrderTotals {
        untaxed_amount,
        tax_amount,
        total_amount,
    });
    Ok(())
}

fn unit_price(
    state: &LedgerState,
    product: ProductId,
    price_list: Option<PriceListId>,
) -> DomainResult<i64> {
    let info = state
        .products
        .get(&product)
        .ok_or_else(|| DomainError::not_found(format!("product {product}")))?;

    let listed = match price_list {
        Some(id) => state
            .price_lists
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("price list {id}")))?
            .prices
            .get(&product)
            .copied(),
        None => None,
    };
    Ok(listed.unwrap_or(info.list_price))
}

fn amount(quantity: i64, unit_price: i64) -> DomainResult<i64> {
    quantity
        .checked_mul(unit_price)
        .ok_or_else(|| DomainError::validation("line amount overflows"))
}

impl LineDerivation for InMemoryLedger {
    fn on_product_change(&self, draft: &LineDraft) -> DomainResult<Derivation> {
        let state = self.read()?;
        let product = state
            .products
            .get(&draft.product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {}", draft.product_id)))?;
        let price = unit_price(&state, draft.product_id, draft.parent.price_list)?;

        Ok(Derivation {
            line: LineChanges {
                unit_id: Some(product.default_unit),
                description: Some(product.rec_name()),
                unit_price: Some(price),
                amount: Some(amount(draft.quantity, price)?),
            },
            parent: None,
            taxes: Some(product.taxes.clone()),
        })
    }

    fn on_quantity_change(&self, draft: &LineDraft) -> DomainResult<Derivation> {
        let state = self.read()?;
        let price = unit_price(&state, draft.product_id, draft.parent.price_list)?;

        Ok(Derivation {
            line: LineChanges {
                unit_price: Some(price),
                amount: Some(amount(draft.quantity, price)?),
                ..LineChanges::default()
            },
            ..Derivation::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxes_sum_per_rate() {
        let vat = TaxRate {
            id: TaxId::new(),
            name: "VAT".to_string(),
            rate_bp: 2000,
        };
        let eco = TaxRate {
            id: TaxId::new(),
            name: "Eco".to_string(),
            rate_bp: 150,
        };
        let rates: HashMap<_, _> = [(vat.id, vat.clone()), (eco.id, eco.clone())].into();

        assert_eq!(line_tax(1000, &[vat.id], &rates).unwrap(), 200);
        assert_eq!(line_tax(1000, &[vat.id, eco.id], &rates).unwrap(), 215);
        assert_eq!(line_tax(-1000, &[vat.id], &rates).unwrap(), -200);
        assert_eq!(line_tax(1000, &[], &rates).unwrap(), 0);
    }

    #[test]
    fn overflowing_tax_is_a_validation_error() {
        let vat = TaxRate {
            id: TaxId::new(),
            name: "VAT".to_string(),
            rate_bp: 2000,
        };
        let rates: HashMap<_, _> = [(vat.id, vat.clone())].into();

        let err = line_tax(i64::MAX / 2, &[vat.id], &rates).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = checked_sum([Ok(i64::MAX), Ok(1)], "untaxed amount").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn tax_truncates_toward_zero(amount in -1_000_000i64..1_000_000, rate_bp in 0i64..5_000) {
                let tax = TaxRate { id: TaxId::new(), name: "T".to_string(), rate_bp };
                let rates: HashMap<_, _> = [(tax.id, tax.clone())].into();

                let owed = line_tax(amount, &[tax.id], &rates).unwrap();
                prop_assert_eq!(owed, -line_tax(-amount, &[tax.id], &rates).unwrap());
                prop_assert!((owed * 10_000).abs() <= (amount * rate_bp).abs());
                prop_assert!((amount * rate_bp).abs() - (owed * 10_000).abs() < 10_000);
            }
        }
    }
}
