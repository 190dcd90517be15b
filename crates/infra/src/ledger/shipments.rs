//! Generic shipment workflow and stock keeping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use forgepos_core::{
    DomainError, DomainResult, LineId, OrderId, Privilege, ProductId, ShipmentId, WarehouseId,
};
use forgepos_fulfillment::{
    Move, NewShipment, Shipment, ShipmentKey, ShipmentKeyBuilder, ShipmentKind, ShipmentState,
    ShipmentWorkflow, StockLevels, Transition, group_lines,
};
use forgepos_sales::{Line, Order, ShipmentMethod};

use super::{InMemoryLedger, LedgerState};

struct StockView<'a>(&'a HashMap<(WarehouseId, ProductId), i64>);

impl StockLevels for StockView<'_> {
    fn available(&self, warehouse: WarehouseId, product: ProductId) -> i64 {
        self.0.get(&(warehouse, product)).copied().unwrap_or(0)
    }
}

/// Signed quantity a line contributes to shipments of `kind`; zero when the
/// line belongs to the other direction.
pub(super) fn owed_for(line: &Line, kind: ShipmentKind) -> i64 {
    match kind {
        ShipmentKind::Outbound => line.quantity.max(0),
        ShipmentKind::Return => (-line.quantity).max(0),
    }
}

/// Quantity per line already carried by shipments of `kind`.
///
/// `done_only` restricts the sum to completed shipments; otherwise every
/// shipment that is not cancelled counts.
pub(super) fn shipped_quantities(
    shipments: &[Shipment],
    order: OrderId,
    kind: ShipmentKind,
    done_only: bool,
) -> HashMap<LineId, i64> {
    let mut totals = HashMap::new();
    for s in shipments {
        if s.order_id() != order || s.kind() != kind {
            continue;
        }
        let counts = match s.state() {
            ShipmentState::Cancel => false,
            ShipmentState::Done => true,
            _ => !done_only,
        };
        if !counts {
            continue;
        }
        for m in s.moves() {
            *totals.entry(m.line_id).or_insert(0) += m.quantity;
        }
    }
    totals
}

fn apply_stock_movement(stock: &mut HashMap<(WarehouseId, ProductId), i64>, shipment: &Shipment) {
    for m in shipment.moves() {
        let delta = match shipment.kind() {
            ShipmentKind::Outbound => -m.quantity,
            ShipmentKind::Return => m.quantity,
        };
        *stock.entry((shipment.warehouse(), m.product_id)).or_insert(0) += delta;
    }
}

impl InMemoryLedger {
    fn build_shipments(
        state: &LedgerState,
        order: &Order,
        kind: ShipmentKind,
        keys: &dyn ShipmentKeyBuilder,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<Shipment>> {
        let shop = state.shop(order.shop_id())?;
        let covered = shipped_quantities(&state.shipments, order.id_typed(), kind, false);
        let remaining: HashMap<LineId, i64> = order
            .lines()
            .iter()
            .map(|l| (l.id, owed_for(l, kind) - covered.get(&l.id).copied().unwrap_or(0)))
            .filter(|(_, q)| *q > 0)
            .collect();

        let planned_date = occurred_at.date_naive();
        let groups = group_lines(
            order.lines().iter().filter(|l| remaining.contains_key(&l.id)),
            |l: &Line| ShipmentKey::base(l.warehouse(order, shop), planned_date),
            keys,
        );

        let mut created = Vec::with_capacity(groups.len());
        for (key, lines) in groups {
            let Some(first) = lines.first() else {
                continue;
            };
            let moves = lines
                .iter()
                .map(|l| Move {
                    line_id: l.id,
                    product_id: l.product_id,
                    quantity: remaining.get(&l.id).copied().unwrap_or(0),
                })
                .collect();
            created.push(Shipment::create(
                ShipmentId::new(),
                NewShipment {
                    kind,
                    order_id: order.id_typed(),
                    shop_id: order.shop_id(),
                    customer: order.party_id(),
                    warehouse: key.warehouse,
                    planned_date: key.planned_date,
                    fulfillment_mode: key.fulfillment_mode.unwrap_or(first.fulfillment_mode),
                    moves,
                },
                occurred_at,
            )?);
        }
        Ok(created)
    }
}

impl ShipmentWorkflow for InMemoryLedger {
    fn create_shipments(
        &self,
        order: &Order,
        kind: ShipmentKind,
        keys: &dyn ShipmentKeyBuilder,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<Shipment>> {
        let mut state = self.write()?;
        let order = state.order(order.id_typed())?.clone();
        if order.shipment_method() == ShipmentMethod::Manual {
            return Ok(Vec::new());
        }

        let created = Self::build_shipments(&state, &order, kind, keys, occurred_at)?;
        state.shipments.extend(created.iter().cloned());
        if !created.is_empty() {
            tracing::info!(
                order_id = %order.id_typed(),
                ?kind,
                count = created.len(),
                "shipments created"
            );
        }
        Ok(created)
    }

    fn transition(
        &self,
        ids: &[ShipmentId],
        step: Transition,
        privilege: Privilege,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let completed = {
            let mut state = self.write()?;
            let LedgerState {
                shipments, stock, ..
            } = &mut *state;

            let mut completed = Vec::new();
            for id in ids {
                let shipment = shipments
                    .iter_mut()
                    .find(|s| s.id_typed() == *id)
                    .ok_or_else(|| DomainError::not_found(format!("shipment {id}")))?;
                shipment.apply(step, privilege, &StockView(&*stock), occurred_at)?;
                if shipment.is_done() {
                    apply_stock_movement(stock, shipment);
                    completed.push(shipment.clone());
                }
            }
            completed
        };

        for shipment in &completed {
            tracing::info!(shipment_id = %shipment.id_typed(), order_id = %shipment.order_id(), "shipment done");
            self.on_shipment_done(shipment, occurred_at)?;
        }
        Ok(())
    }

    fn shipments(&self, ids: &[ShipmentId]) -> DomainResult<Vec<Shipment>> {
        let state = self.read()?;
        ids.iter()
            .map(|id| {
                state
                    .shipments
                    .iter()
                    .find(|s| s.id_typed() == *id)
                    .cloned()
                    .ok_or_else(|| DomainError::not_found(format!("shipment {id}")))
            })
            .collect()
    }
}
