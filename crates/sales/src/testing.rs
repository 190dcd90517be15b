//! Small single-threaded ledger used by the unit tests of this crate.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use forgepos_core::{
    AddressId, DomainError, DomainResult, LineId, OrderId, PartyId, ProductId, ShopId, TaxId,
    UnitId, WarehouseId,
};

use crate::order::{FulfillmentMode, Line, NewOrder, Order, OrderTotals};
use crate::ports::{
    Address, AddressKind, Derivation, Directory, LineChanges, LineDerivation, LineDraft,
    LineQuery, LineWrite, NewLine, PartyInfo, ProductInfo, SalesLedger, UnitInfo,
};
use crate::shop::ShopConfig;

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    products: HashMap<ProductId, ProductInfo>,
    units: HashMap<UnitId, UnitInfo>,
    parties: HashMap<PartyId, PartyInfo>,
    addresses: Vec<Address>,
    /// Rate in basis points.
    taxes: HashMap<TaxId, i64>,
}

pub(crate) struct Book {
    pub shop: ShopConfig,
    pub unit: UnitId,
    state: RefCell<State>,
}

impl Book {
    pub fn new() -> Self {
        let shop = ShopConfig {
            id: ShopId::new(),
            name: "Main street".to_string(),
            warehouse: WarehouseId::new(),
            anonymous_customer: PartyId::new(),
            default_fulfillment: FulfillmentMode::Ship,
            ship_from_warehouse: WarehouseId::new(),
        };
        let unit = UnitId::new();
        let mut state = State::default();
        state.units.insert(
            unit,
            UnitInfo {
                id: unit,
                name: "Unit".to_string(),
                symbol: "u".to_string(),
            },
        );
        state.parties.insert(
            shop.anonymous_customer,
            PartyInfo {
                id: shop.anonymous_customer,
                name: "Walk-in".to_string(),
            },
        );
        Self {
            shop,
            unit,
            state: RefCell::new(state),
        }
    }

    pub fn open_order(&self, created: DateTime<Utc>) -> OrderId {
        self.open_order_in(self.shop.id, created)
    }

    pub fn open_order_in(&self, shop: ShopId, created: DateTime<Utc>) -> OrderId {
        let mut new = NewOrder::walk_in(&self.shop, "USD");
        new.shop_id = shop;
        let id = OrderId::new();
        let order = Order::open(id, new, created).unwrap();
        self.state.borrow_mut().orders.insert(id, order);
        id
    }

    pub fn party(&self, name: &str) -> PartyId {
        let id = PartyId::new();
        self.state.borrow_mut().parties.insert(
            id,
            PartyInfo {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn address(&self, party: PartyId, kind: AddressKind, street: &str) -> AddressId {
        let id = AddressId::new();
        self.state.borrow_mut().addresses.push(Address {
            id,
            party_id: party,
            name: None,
            street: Some(street.to_string()),
            city: None,
            zip: None,
            country: None,
            invoice: kind == AddressKind::Invoice,
            delivery: kind == AddressKind::Delivery,
        });
        id
    }

    pub fn product(&self, list_price: i64, taxes: Vec<TaxId>) -> ProductId {
        let id = ProductId::new();
        self.state.borrow_mut().products.insert(
            id,
            ProductInfo {
                id,
                code: None,
                name: format!("Product {list_price}"),
                default_image: None,
                default_unit: self.unit,
                list_price,
                taxes,
            },
        );
        id
    }

    pub fn tax(&self, rate_bp: i64) -> TaxId {
        let id = TaxId::new();
        self.state.borrow_mut().taxes.insert(id, rate_bp);
        id
    }

    pub fn seed_line(
        &self,
        order_id: OrderId,
        product: ProductId,
        mode: FulfillmentMode,
        quantity: i64,
    ) -> LineId {
        self.create_line(
            NewLine {
                order_id,
                product_id: product,
                unit_id: Some(self.unit),
                description: None,
                quantity,
                unit_price: 0,
                amount: 0,
                fulfillment_mode: Some(mode),
            },
            at(1),
        )
        .unwrap()
    }

    pub fn touch_line(&self, line: LineId, when: DateTime<Utc>) {
        self.write_line(line, &LineWrite::default(), when).unwrap();
    }

    pub fn line_taxes(&self, line: LineId) -> Vec<TaxId> {
        self.line(line).unwrap().taxes
    }

    pub fn confirm(&self, order_id: OrderId) {
        let mut state = self.state.borrow_mut();
        let order = state.orders.get_mut(&order_id).unwrap();
        order.quote(at(100)).unwrap();
        order.confirm(at(101)).unwrap();
    }

    fn with_line_order<T>(
        &self,
        line: LineId,
        f: impl FnOnce(&mut State, OrderId) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let mut state = self.state.borrow_mut();
        let order_id = state
            .orders
            .values()
            .find(|o| o.line(line).is_some())
            .map(Order::id_typed)
            .ok_or_else(|| DomainError::not_found(format!("line {line}")))?;
        f(&mut *state, order_id)
    }
}

fn recompute(state: &mut State, order_id: OrderId) {
    let taxes = state.taxes.clone();
    if let Some(order) = state.orders.get_mut(&order_id) {
        let untaxed: i64 = order.lines().iter().map(|l| l.amount).sum();
        let tax: i64 = order
            .lines()
            .iter()
            .map(|l| {
                l.taxes
                    .iter()
                    .map(|t| l.amount * taxes.get(t).copied().unwrap_or(0) / 10_000)
                    .sum::<i64>()
            })
            .sum();
        order.set_totals(OrderTotals {
            untaxed_amount: untaxed,
            tax_amount: tax,
            total_amount: untaxed + tax,
        });
    }
}

impl SalesLedger for Book {
    fn order(&self, id: OrderId) -> DomainResult<Order> {
        self.state
            .borrow()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("order {id}")))
    }

    fn line(&self, id: LineId) -> DomainResult<Line> {
        self.state
            .borrow()
            .orders
            .values()
            .find_map(|o| o.line(id).cloned())
            .ok_or_else(|| DomainError::not_found(format!("line {id}")))
    }

    fn search_lines(&self, query: &LineQuery) -> DomainResult<Vec<LineId>> {
        let order = self.order(query.order_id)?;
        Ok(order
            .lines()
            .iter()
            .filter(|l| query.matches(l))
            .map(|l| l.id)
            .collect())
    }

    fn create_line(&self, line: NewLine, occurred_at: DateTime<Utc>) -> DomainResult<LineId> {
        let mut state = self.state.borrow_mut();
        let order = state
            .orders
            .get_mut(&line.order_id)
            .ok_or_else(|| DomainError::not_found(format!("order {}", line.order_id)))?;
        let id = LineId::new();
        order.insert_line(Line {
            id,
            order_id: line.order_id,
            product_id: line.product_id,
            unit_id: line.unit_id,
            description: line.description,
            quantity: line.quantity,
            unit_price: line.unit_price,
            amount: line.amount,
            fulfillment_mode: self.shop.line_fulfillment(line.fulfillment_mode),
            taxes: Vec::new(),
            created_at: occurred_at,
            updated_at: occurred_at,
        })?;
        recompute(&mut state, line.order_id);
        Ok(id)
    }

    fn write_line(
        &self,
        id: LineId,
        write: &LineWrite,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line_order(id, |state, order_id| {
            let order = state
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;
            order.update_line(id, |line| {
                if let Some(q) = write.quantity {
                    line.quantity = q;
                }
                if let Some(m) = write.fulfillment_mode {
                    line.fulfillment_mode = m;
                }
                if let Some(u) = write.unit_id {
                    line.unit_id = Some(u);
                }
                if let Some(d) = &write.description {
                    line.description = Some(d.clone());
                }
                if let Some(p) = write.unit_price {
                    line.unit_price = p;
                }
                if let Some(a) = write.amount {
                    line.amount = a;
                }
                line.updated_at = occurred_at;
                Ok(())
            })?;
            recompute(state, order_id);
            Ok(())
        })
    }

    fn set_line_taxes(
        &self,
        id: LineId,
        taxes: &[TaxId],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.with_line_order(id, |state, order_id| {
            let order = state
                .orders
                .get_mut(&order_id)
                .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;
            order.update_line(id, |line| {
                line.taxes = taxes.to_vec();
                line.updated_at = occurred_at;
                Ok(())
            })?;
            recompute(state, order_id);
            Ok(())
        })
    }

    fn shop_orders(&self, shop: ShopId) -> DomainResult<Vec<Order>> {
        Ok(self
            .state
            .borrow()
            .orders
            .values()
            .filter(|o| o.shop_id() == shop)
            .cloned()
            .collect())
    }
}

impl LineDerivation for Book {
    fn on_product_change(&self, draft: &LineDraft) -> DomainResult<Derivation> {
        let product = self.product_info(draft.product_id)?;
        Ok(Derivation {
            line: LineChanges {
                unit_id: Some(product.default_unit),
                description: Some(product.rec_name()),
                unit_price: Some(product.list_price),
                amount: Some(draft.quantity * product.list_price),
            },
            parent: None,
            taxes: Some(product.taxes),
        })
    }

    fn on_quantity_change(&self, draft: &LineDraft) -> DomainResult<Derivation> {
        let product = self.product_info(draft.product_id)?;
        Ok(Derivation {
            line: LineChanges {
                unit_price: Some(product.list_price),
                amount: Some(draft.quantity * product.list_price),
                ..LineChanges::default()
            },
            ..Derivation::default()
        })
    }
}

impl Book {
    fn product_info(&self, id: ProductId) -> DomainResult<ProductInfo> {
        self.state
            .borrow()
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("product {id}")))
    }
}

impl Directory for Book {
    fn product(&self, id: ProductId) -> DomainResult<ProductInfo> {
        self.product_info(id)
    }

    fn unit(&self, id: UnitId) -> DomainResult<UnitInfo> {
        self.state
            .borrow()
            .units
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("unit {id}")))
    }

    fn party(&self, id: PartyId) -> DomainResult<PartyInfo> {
        self.state
            .borrow()
            .parties
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("party {id}")))
    }

    fn address(&self, id: AddressId) -> DomainResult<Address> {
        self.state
            .borrow()
            .addresses
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("address {id}")))
    }

    fn first_address(&self, party: PartyId, kind: AddressKind) -> DomainResult<Option<Address>> {
        Ok(self
            .state
            .borrow()
            .addresses
            .iter()
            .find(|a| a.party_id == party && a.is_kind(kind))
            .cloned())
    }
}
