//! Per-storefront settings.

use serde::{Deserialize, Serialize};

use forgepos_core::{PartyId, ShopId, WarehouseId};

use crate::order::FulfillmentMode;

/// Static configuration of one storefront. Read-only input to the cart and
/// fulfillment logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub id: ShopId,
    pub name: String,
    /// Warehouse pick-up lines are served from.
    pub warehouse: WarehouseId,
    /// Party used for walk-in carts.
    pub anonymous_customer: PartyId,
    /// Mode given to lines created without an explicit one.
    #[serde(default = "default_fulfillment")]
    pub default_fulfillment: FulfillmentMode,
    /// Warehouse ship lines (backorders) leave from.
    pub ship_from_warehouse: WarehouseId,
}

fn default_fulfillment() -> FulfillmentMode {
    FulfillmentMode::Ship
}

impl ShopConfig {
    /// Mode for a line created through the generic path.
    pub fn line_fulfillment(&self, requested: Option<FulfillmentMode>) -> FulfillmentMode {
        requested.unwrap_or(self.default_fulfillment)
    }
}
