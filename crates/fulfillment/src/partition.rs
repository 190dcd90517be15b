//! Splits an order into shipments by fulfillment mode and drives the pick-up
//! ones to completion inside the same call.

use chrono::{DateTime, Utc};

use forgepos_core::{DomainResult, Privilege, ShipmentId};
use forgepos_sales::{FulfillmentMode, Order, ShipmentMethod};

use crate::grouping::FulfillmentModeKey;
use crate::ports::ShipmentWorkflow;
use crate::shipment::{Shipment, ShipmentKind, Transition};

/// Steps forcing a pick-up shipment of `kind` to `done`, in order.
pub fn fast_path(kind: ShipmentKind) -> &'static [Transition] {
    match kind {
        ShipmentKind::Outbound => &[Transition::AssignForce, Transition::Pack, Transition::Done],
        ShipmentKind::Return => &[Transition::Receive, Transition::Done],
    }
}

pub fn create_shipments<W: ShipmentWorkflow + ?Sized>(
    workflow: &W,
    order: &Order,
    kind: ShipmentKind,
    occurred_at: DateTime<Utc>,
) -> DomainResult<Vec<Shipment>> {
    let shipments = workflow.create_shipments(order, kind, &FulfillmentModeKey, occurred_at)?;
    if order.shipment_method() == ShipmentMethod::Manual || shipments.is_empty() {
        return Ok(shipments);
    }

    let pick_up: Vec<ShipmentId> = shipments
        .iter()
        .filter(|s| s.fulfillment_mode() == FulfillmentMode::PickUp)
        .map(Shipment::id_typed)
        .collect();

    if !pick_up.is_empty() {
        for step in fast_path(kind) {
            tracing::debug!(order_id = %order.id_typed(), ?kind, ?step, count = pick_up.len(), "fast path step");
            workflow.transition(&pick_up, *step, Privilege::System, occurred_at)?;
        }
        tracing::info!(
            order_id = %order.id_typed(),
            ?kind,
            completed = pick_up.len(),
            "pick-up shipments completed"
        );
    }

    let ids: Vec<ShipmentId> = shipments.iter().map(Shipment::id_typed).collect();
    workflow.shipments(&ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use chrono::TimeZone;
    use forgepos_core::{DomainError, LineId, OrderId, PartyId, ProductId, ShopId, WarehouseId};
    use forgepos_sales::{Line, NewOrder, ShopConfig};

    use crate::grouping::{ShipmentKey, ShipmentKeyBuilder, group_lines};
    use crate::shipment::{Move, NewShipment, ShipmentState, StockLevels};

    struct NoStock;

    impl StockLevels for NoStock {
        fn available(&self, _: WarehouseId, _: ProductId) -> i64 {
            0
        }
    }

    /// Workflow double: groups lines, keeps shipments in memory, records steps.
    struct Recorder {
        shop: ShopConfig,
        shipments: RefCell<Vec<Shipment>>,
        steps: RefCell<Vec<(Transition, Privilege, usize)>>,
        fail_on: Option<Transition>,
    }

    impl Recorder {
        fn new(shop: ShopConfig) -> Self {
            Self {
                shop,
                shipments: RefCell::new(vec![]),
                steps: RefCell::new(vec![]),
                fail_on: None,
            }
        }
    }

    impl ShipmentWorkflow for Recorder {
        fn create_shipments(
            &self,
            order: &Order,
            kind: ShipmentKind,
            keys: &dyn ShipmentKeyBuilder,
            occurred_at: DateTime<Utc>,
        ) -> DomainResult<Vec<Shipment>> {
            let date = occurred_at.date_naive();
            let wanted = order.lines().iter().filter(|l| match kind {
                ShipmentKind::Outbound => l.quantity > 0,
                ShipmentKind::Return => l.quantity < 0,
            });
            let groups = group_lines(
                wanted,
                |l: &Line| ShipmentKey::base(l.warehouse(order, &self.shop), date),
                keys,
            );

            let mut created = vec![];
            for (key, lines) in groups {
                let shipment = Shipment::create(
                    ShipmentId::new(),
                    NewShipment {
                        kind,
                        order_id: order.id_typed(),
                        shop_id: order.shop_id(),
                        customer: order.party_id(),
                        warehouse: key.warehouse,
                        planned_date: key.planned_date,
                        fulfillment_mode: lines[0].fulfillment_mode,
                        moves: lines
                            .iter()
                            .map(|l| Move {
                                line_id: l.id,
                                product_id: l.product_id,
                                quantity: l.quantity.abs(),
                            })
                            .collect(),
                    },
                    occurred_at,
                )?;
                created.push(shipment);
            }
            self.shipments.borrow_mut().extend(created.iter().cloned());
            Ok(created)
        }

        fn transition(
            &self,
            ids: &[ShipmentId],
            step: Transition,
            privilege: Privilege,
            occurred_at: DateTime<Utc>,
        ) -> DomainResult<()> {
            self.steps.borrow_mut().push((step, privilege, ids.len()));
            if self.fail_on == Some(step) {
                return Err(DomainError::invariant("workflow refused the step"));
            }
            for s in self.shipments.borrow_mut().iter_mut() {
                if ids.contains(&s.id_typed()) {
                    s.apply(step, privilege, &NoStock, occurred_at)?;
                }
            }
            Ok(())
        }

        fn shipments(&self, ids: &[ShipmentId]) -> DomainResult<Vec<Shipment>> {
            Ok(self
                .shipments
                .borrow()
                .iter()
                .filter(|s| ids.contains(&s.id_typed()))
                .cloned()
                .collect())
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn shop() -> ShopConfig {
        ShopConfig {
            id: ShopId::new(),
            name: "Harbour".to_string(),
            warehouse: WarehouseId::new(),
            anonymous_customer: PartyId::new(),
            default_fulfillment: FulfillmentMode::Ship,
            ship_from_warehouse: WarehouseId::new(),
        }
    }

    fn order_with(shop: &ShopConfig, method: ShipmentMethod, lines: &[(FulfillmentMode, i64)]) -> Order {
        let mut new = NewOrder::walk_in(shop, "EUR");
        new.shipment_method = method;
        let mut order = Order::open(OrderId::new(), new, t(0)).unwrap();
        for (mode, qty) in lines {
            order
                .insert_line(Line {
                    id: LineId::new(),
                    order_id: order.id_typed(),
                    product_id: ProductId::new(),
                    unit_id: None,
                    description: None,
                    quantity: *qty,
                    unit_price: 500,
                    amount: qty * 500,
                    fulfillment_mode: *mode,
                    taxes: vec![],
                    created_at: t(1),
                    updated_at: t(1),
                })
                .unwrap();
        }
        order
    }

    #[test]
    fn pick_up_completes_and_ship_waits() {
        let shop = shop();
        let order = order_with(
            &shop,
            ShipmentMethod::Order,
            &[(FulfillmentMode::PickUp, 1), (FulfillmentMode::Ship, 1)],
        );
        let workflow = Recorder::new(shop.clone());

        let shipments = create_shipments(&workflow, &order, ShipmentKind::Outbound, t(5)).unwrap();
        assert_eq!(shipments.len(), 2);

        let pick = shipments.iter().find(|s| s.fulfillment_mode() == FulfillmentMode::PickUp).unwrap();
        let ship = shipments.iter().find(|s| s.fulfillment_mode() == FulfillmentMode::Ship).unwrap();
        assert_eq!(pick.state(), ShipmentState::Done);
        assert_eq!(pick.warehouse(), shop.warehouse);
        assert_eq!(ship.state(), ShipmentState::Waiting);
        assert_eq!(ship.warehouse(), shop.ship_from_warehouse);

        let steps = workflow.steps.borrow();
        assert_eq!(
            steps.iter().map(|(s, _, _)| *s).collect::<Vec<_>>(),
            vec![Transition::AssignForce, Transition::Pack, Transition::Done]
        );
        assert!(steps.iter().all(|(_, p, n)| *p == Privilege::System && *n == 1));
    }

    #[test]
    fn negative_pick_up_line_is_received_back() {
        let shop = shop();
        let order = order_with(&shop, ShipmentMethod::Order, &[(FulfillmentMode::PickUp, -2)]);
        let workflow = Recorder::new(shop);

        let returns = create_shipments(&workflow, &order, ShipmentKind::Return, t(5)).unwrap();
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].kind(), ShipmentKind::Return);
        assert_eq!(returns[0].state(), ShipmentState::Done);
        assert_eq!(returns[0].moves()[0].quantity, 2);

        let outbound = create_shipments(&workflow, &order, ShipmentKind::Outbound, t(5)).unwrap();
        assert!(outbound.is_empty());
    }

    #[test]
    fn manual_method_touches_nothing() {
        let shop = shop();
        let order = order_with(&shop, ShipmentMethod::Manual, &[(FulfillmentMode::PickUp, 1)]);
        let workflow = Recorder::new(shop);

        let shipments = create_shipments(&workflow, &order, ShipmentKind::Outbound, t(5)).unwrap();
        assert!(workflow.steps.borrow().is_empty());
        assert!(shipments.iter().all(|s| s.state() == ShipmentState::Waiting));
    }

    #[test]
    fn ship_only_order_runs_no_steps() {
        let shop = shop();
        let order = order_with(&shop, ShipmentMethod::Order, &[(FulfillmentMode::Ship, 4)]);
        let workflow = Recorder::new(shop);

        let shipments = create_shipments(&workflow, &order, ShipmentKind::Outbound, t(5)).unwrap();
        assert_eq!(shipments.len(), 1);
        assert!(workflow.steps.borrow().is_empty());
    }

    #[test]
    fn failing_step_stops_the_sequence() {
        let shop = shop();
        let order = order_with(&shop, ShipmentMethod::Order, &[(FulfillmentMode::PickUp, 1)]);
        let mut workflow = Recorder::new(shop);
        workflow.fail_on = Some(Transition::Pack);

        let err = create_shipments(&workflow, &order, ShipmentKind::Outbound, t(5)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(workflow.steps.borrow().len(), 2);
    }
}
