//! `forgepos-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the sales, fulfillment and
//! invoicing crates (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod privilege;

pub use aggregate::AggregateRoot;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AddressId, ImageId, InvoiceId, LineId, OrderId, PartyId, PriceListId, ProductId, ShipmentId,
    ShopId, TaxId, UnitId, WarehouseId,
};
pub use privilege::Privilege;
