//! Infrastructure layer: storage adapters, configuration, and the order
//! submission workflow that composes them.

pub mod config;
pub mod store;
pub mod workflow;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use store::{
    CatalogAdmin, CouponLedger, InMemoryStore, KitCatalog, OrderStore, PostgresStore, StoreError,
};
pub use workflow::OrderWorkflow;
