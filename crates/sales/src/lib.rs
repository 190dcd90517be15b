//! Sales domain module: POS carts (orders), shop configuration and the read
//! projections the POS client consumes.
//!
//! Persistence, pricing and master data are reached through the traits in
//! [`ports`]; this crate holds the decision logic only (no IO, no storage).

pub mod cart;
pub mod order;
pub mod ports;
pub mod recent;
pub mod shop;
pub mod view;

#[cfg(test)]
mod testing;

pub use cart::{AddProduct, CartContext, CartMutation, add_product};
pub use order::{
    FulfillmentMode, InvoiceMethod, Line, NewOrder, Order, OrderState, OrderTotals,
    ShipmentMethod,
};
pub use ports::{
    Address, AddressKind, Derivation, Directory, LineChanges, LineDerivation, LineDraft,
    LineQuery, LineWrite, NewLine, ParentSnapshot, PartyInfo, ProductInfo, SalesLedger, UnitInfo,
};
pub use recent::{DEFAULT_RECENT_WINDOW_DAYS, recent_open_orders, select_recent};
pub use shop::ShopConfig;
pub use view::{
    AddressView, Audience, CartLineView, CartView, GenericProjection, OrderSummary, Projection,
    cart_view, order_summary, serialize,
};
