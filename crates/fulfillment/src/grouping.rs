//! Shipment grouping keys.
//!
//! Lines with equal keys travel in the same shipment. The shipment workflow
//! computes a base key per line and lets a [`ShipmentKeyBuilder`] extend it.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use forgepos_core::WarehouseId;
use forgepos_sales::{FulfillmentMode, Line};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShipmentKey {
    pub warehouse: WarehouseId,
    pub planned_date: NaiveDate,
    /// Set only by builders that split on mode.
    pub fulfillment_mode: Option<FulfillmentMode>,
}

impl ShipmentKey {
    pub fn base(warehouse: WarehouseId, planned_date: NaiveDate) -> Self {
        Self {
            warehouse,
            planned_date,
            fulfillment_mode: None,
        }
    }
}

/// Extension point for the grouping key.
pub trait ShipmentKeyBuilder {
    fn key(&self, base: ShipmentKey, line: &Line) -> ShipmentKey;
}

/// Groups on the base key only.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseKey;

impl ShipmentKeyBuilder for BaseKey {
    fn key(&self, base: ShipmentKey, _line: &Line) -> ShipmentKey {
        base
    }
}

/// Appends the line's fulfillment mode so pick-up and ship lines never share a
/// shipment.
#[derive(Debug, Clone, Copy, Default)]
pub struct FulfillmentModeKey;

impl ShipmentKeyBuilder for FulfillmentModeKey {
    fn key(&self, base: ShipmentKey, line: &Line) -> ShipmentKey {
        ShipmentKey {
            fulfillment_mode: Some(line.fulfillment_mode),
            ..base
        }
    }
}

/// Bucket `lines` by key. Iteration order of the result is the key order.
pub fn group_lines<'a, I, F>(
    lines: I,
    base: F,
    builder: &dyn ShipmentKeyBuilder,
) -> BTreeMap<ShipmentKey, Vec<&'a Line>>
where
    I: IntoIterator<Item = &'a Line>,
    F: Fn(&Line) -> ShipmentKey,
{
    let mut groups: BTreeMap<ShipmentKey, Vec<&'a Line>> = BTreeMap::new();
    for line in lines {
        let key = builder.key(base(line), line);
        groups.entry(key).or_default().push(line);
    }
    groups
}
