//! In-memory reference ledger.
//!
//! Implements every port the POS logic talks to: order and line persistence,
//! master data, pricing hooks, the shipment workflow and the invoicing
//! workflow. Intended for tests/dev and as the executable reference of the
//! ports' contracts. Not optimized for performance.
//!
//! ## Transactions
//!
//! [`InMemoryLedger::transaction`] serializes writers on one lock and hands the
//! closure a private working copy of the state. The copy replaces the shared
//! state only when the closure returns `Ok`, so readers never observe an
//! uncommitted change and a failed operation leaves nothing behind. Writes made
//! outside a transaction take the same lock, so they are never overwritten by a
//! concurrent commit.

mod invoices;
mod pricing;
mod shipments;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgepos_core::{
    AddressId, DomainError, DomainResult, LineId, OrderId, PartyId, PriceListId, ProductId,
    ShopId, TaxId, UnitId, WarehouseId,
};
use forgepos_fulfillment::Shipment;
use forgepos_invoicing::Invoice;
use forgepos_sales::{
    Address, AddressKind, Directory, Line, LineQuery, LineWrite, NewLine, NewOrder, Order,
    PartyInfo, ProductInfo, SalesLedger, ShopConfig, UnitInfo,
};

/// A tax and its rate in basis points (1/100 of a percent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate {
    pub id: TaxId,
    pub name: String,
    pub rate_bp: i64,
}

/// Fixed per-product prices overriding the list price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: PriceListId,
    pub name: String,
    pub prices: HashMap<ProductId, i64>,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    shops: HashMap<ShopId, ShopConfig>,
    products: HashMap<ProductId, ProductInfo>,
    units: HashMap<UnitId, UnitInfo>,
    parties: HashMap<PartyId, PartyInfo>,
    /// Kept in registration order: "first address" means first registered.
    addresses: Vec<Address>,
    taxes: HashMap<TaxId, TaxRate>,
    price_lists: HashMap<PriceListId, PriceList>,
    stock: HashMap<(WarehouseId, ProductId), i64>,
    orders: HashMap<OrderId, Order>,
    line_orders: HashMap<LineId, OrderId>,
    shipments: Vec<Shipment>,
    invoices: Vec<Invoice>,
}

impl LedgerState {
    fn order(&self, id: OrderId) -> DomainResult<&Order> {
        self.orders
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("order {id}")))
    }

    fn order_mut(&mut self, id: OrderId) -> DomainResult<&mut Order> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("order {id}")))
    }

    fn shop(&self, id: ShopId) -> DomainResult<&ShopConfig> {
        self.shops
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("shop {id}")))
    }

    fn line_order(&self, line: LineId) -> DomainResult<OrderId> {
        self.line_orders
            .get(&line)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("line {line}")))
    }
}

/// Write access to the ledger state, holding the writer lock when taken
/// outside a transaction.
struct StateWrite<'a> {
    state: RwLockWriteGuard<'a, LedgerState>,
    _tx: Option<MutexGuard<'a, ()>>,
}

impl Deref for StateWrite<'_> {
    type Target = LedgerState;

    fn deref(&self) -> &LedgerState {
        &self.state
    }
}

impl DerefMut for StateWrite<'_> {
    fn deref_mut(&mut self) -> &mut LedgerState {
        &mut self.state
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    tx: Mutex<()>,
    /// Set on the working copy handed to a transaction closure.
    working_copy: bool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as one all-or-nothing unit of work.
    ///
    /// `f` receives a working copy of the ledger; its changes become visible
    /// to other callers only once `f` returns `Ok`.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DomainError>,
    {
        let _guard = self.lock_writers()?;
        let working = Self {
            state: RwLock::new(self.read()?.clone()),
            tx: Mutex::new(()),
            working_copy: true,
        };

        match f(&working) {
            Ok(value) => {
                let committed = working
                    .state
                    .into_inner()
                    .map_err(|_| DomainError::conflict("ledger lock poisoned"))?;
                *self.state_mut()? = committed;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!("transaction rolled back");
                Err(err)
            }
        }
    }

    fn lock_writers(&self) -> DomainResult<MutexGuard<'_, ()>> {
        self.tx
            .lock()
            .map_err(|_| DomainError::conflict("transaction lock poisoned"))
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| DomainError::conflict("ledger lock poisoned"))
    }

    fn state_mut(&self) -> DomainResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| DomainError::conflict("ledger lock poisoned"))
    }

    /// Writer access. Outside a transaction this waits for any open one to
    /// finish first. Callers must drop the guard before calling another
    /// writing method.
    fn write(&self) -> DomainResult<StateWrite<'_>> {
        let tx = if self.working_copy {
            None
        } else {
            Some(self.lock_writers()?)
        };
        Ok(StateWrite {
            state: self.state_mut()?,
            _tx: tx,
        })
    }

    // ---- master data ----

    pub fn add_shop(&self, shop: ShopConfig) -> DomainResult<()> {
        self.write()?.shops.insert(shop.id, shop);
        Ok(())
    }

    pub fn shop(&self, id: ShopId) -> DomainResult<ShopConfig> {
        self.read()?.shop(id).cloned()
    }

    pub fn add_product(&self, product: ProductInfo) -> DomainResult<()> {
        self.write()?.products.insert(product.id, product);
        Ok(())
    }

    pub fn add_unit(&self, unit: UnitInfo) -> DomainResult<()> {
        self.write()?.units.insert(unit.id, unit);
        Ok(())
    }

    pub fn add_party(&self, party: PartyInfo) -> DomainResult<()> {
        self.write()?.parties.insert(party.id, party);
        Ok(())
    }

    pub fn add_address(&self, address: Address) -> DomainResult<()> {
        let mut state = self.write()?;
        if !state.parties.contains_key(&address.party_id) {
            return Err(DomainError::not_found(format!("party {}", address.party_id)));
        }
        state.addresses.push(address);
        Ok(())
    }

    pub fn add_tax(&self, tax: TaxRate) -> DomainResult<()> {
        self.write()?.taxes.insert(tax.id, tax);
        Ok(())
    }

    pub fn add_price_list(&self, list: PriceList) -> DomainResult<()> {
        self.write()?.price_lists.insert(list.id, list);
        Ok(())
    }

    pub fn set_stock(&self, warehouse: WarehouseId, product: ProductId, quantity: i64) -> DomainResult<()> {
        self.write()?.stock.insert((warehouse, product), quantity);
        Ok(())
    }

    pub fn stock(&self, warehouse: WarehouseId, product: ProductId) -> DomainResult<i64> {
        Ok(self
            .read()?
            .stock
            .get(&(warehouse, product))
            .copied()
            .unwrap_or(0))
    }

    // ---- orders ----

    pub fn open_order(&self, new: NewOrder, occurred_at: DateTime<Utc>) -> DomainResult<OrderId> {
        let mut state = self.write()?;
        state.shop(new.shop_id)?;
        if !state.parties.contains_key(&new.party_id) {
            return Err(DomainError::not_found(format!("party {}", new.party_id)));
        }
        let id = OrderId::new();
        let order = Order::open(id, new, occurred_at)?;
        state.orders.insert(id, order);
        tracing::info!(order_id = %id, "order opened");
        Ok(id)
    }

    /// Apply a header transition to an order and return the result.
    pub fn update_order(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> DomainResult<()>,
    ) -> DomainResult<Order> {
        let mut state = self.write()?;
        let order = state.order_mut(id)?;
        f(order)?;
        Ok(order.clone())
    }

    pub fn order_shipments(&self, order: OrderId) -> DomainResult<Vec<Shipment>> {
        Ok(self
            .read()?
            .shipments
            .iter()
            .filter(|s| s.order_id() == order)
            .cloned()
            .collect())
    }

    pub fn order_invoices(&self, order: OrderId) -> DomainResult<Vec<Invoice>> {
        Ok(self
            .read()?
            .invoices
            .iter()
            .filter(|i| i.order_id() == order)
            .cloned()
            .collect())
    }
}

impl SalesLedger for InMemoryLedger {
    fn order(&self, id: OrderId) -> DomainResult<Order> {
        self.read()?.order(id).cloned()
    }

    fn line(&self, id: LineId) -> DomainResult<Line> {
        let state = self.read()?;
        let order = state.order(state.line_order(id)?)?;
        order
            .line(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("line {id}")))
    }

    fn search_lines(&self, query: &LineQuery) -> DomainResult<Vec<LineId>> {
        let state = self.read()?;
        Ok(state
            .order(query.order_id)?
            .lines()
            .iter()
            .filter(|l| query.matches(l))
            .map(|l| l.id)
            .collect())
    }

    fn create_line(&self, line: NewLine, occurred_at: DateTime<Utc>) -> DomainResult<LineId> {
        let mut state = self.write()?;
        if !state.products.contains_key(&line.product_id) {
            return Err(DomainError::not_found(format!("product {}", line.product_id)));
        }
        let shop_id = state.order(line.order_id)?.shop_id();
        let mode = state.shop(shop_id)?.line_fulfillment(line.fulfillment_mode);

        let id = LineId::new();
        state.order_mut(line.order_id)?.insert_line(Line {
            id,
            order_id: line.order_id,
            product_id: line.product_id,
            unit_id: line.unit_id,
            description: line.description,
            quantity: line.quantity,
            unit_price: line.unit_price,
            amount: line.amount,
            fulfillment_mode: mode,
            taxes: Vec::new(),
            created_at: occurred_at,
            updated_at: occurred_at,
        })?;
        state.line_orders.insert(id, line.order_id);
        pricing::recompute_totals(&mut *state, line.order_id)?;
        Ok(id)
    }

    fn write_line(
        &self,
        id: LineId,
        write: &LineWrite,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut state = self.write()?;
        let order_id = state.line_order(id)?;
        state.order_mut(order_id)?.update_line(id, |line| {
            if let Some(quantity) = write.quantity {
                line.quantity = quantity;
            }
            if let Some(mode) = write.fulfillment_mode {
                line.fulfillment_mode = mode;
            }
            if let Some(unit) = write.unit_id {
                line.unit_id = Some(unit);
            }
            if let Some(description) = &write.description {
                line.description = Some(description.clone());
            }
            if let Some(price) = write.unit_price {
                line.unit_price = price;
            }
            if let Some(amount) = write.amount {
                line.amount = amount;
            }
            line.updated_at = occurred_at;
            Ok(())
        })?;

        pricing::recompute_totals(&mut *state, order_id)
    }

    fn set_line_taxes(
        &self,
        id: LineId,
        taxes: &[TaxId],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut state = self.write()?;
        if let Some(unknown) = taxes.iter().find(|t| !state.taxes.contains_key(*t)) {
            return Err(DomainError::not_found(format!("tax {unknown}")));
        }
        let order_id = state.line_order(id)?;
        state.order_mut(order_id)?.update_line(id, |line| {
            line.taxes = taxes.to_vec();
            line.updated_at = occurred_at;
            Ok(())
        })?;

        pricing::recompute_totals(&mut *state, order_id)
    }

    fn shop_orders(&self, shop: ShopId) -> DomainResult<Vec<Order>> {
        Ok(self
            .read()?
            .orders
            .values()
            .filter(|o| o.shop_id() == shop)
            .cloned()
            .collect())
    }
}

impl Directory for InMemoryLedger {
    fn product(&self, id: ProductId) -> DomainResult<ProductInfo> {
        self.read()?
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("product {id}")))
    }

    fn unit(&self, id: UnitId) -> DomainResult<UnitInfo> {
        self.read()?
            .units
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("unit {id}")))
    }

    fn party(&self, id: PartyId) -> DomainResult<PartyInfo> {
        self.read()?
            .parties
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("party {id}")))
    }

    fn address(&self, id: AddressId) -> DomainResult<Address> {
        self.read()?
            .addresses
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("address {id}")))
    }

    fn first_address(&self, party: PartyId, kind: AddressKind) -> DomainResult<Option<Address>> {
        Ok(self
            .read()?
            .addresses
            .iter()
            .find(|a| a.party_id == party && a.is_kind(kind))
            .cloned())
    }
}
