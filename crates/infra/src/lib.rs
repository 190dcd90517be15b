//! Infrastructure layer: the in-memory ledger implementing every port, runtime
//! configuration and the service facade the POS front end calls.

pub mod config;
pub mod error;
pub mod ledger;
pub mod service;


pub use config::PosConfig;
pub use error::PosError;
pub use ledger::{InMemoryLedger, PriceList, TaxRate};
pub use service::{PosService, ProcessOutcome};
