//! Infrastructure layer: storage, services, configuration.
//!
//! - [`store`]: the transactional `CatalogStore` seam with in-memory and
//!   SQLite implementations
//! - [`services`]: the catalog operations on top of a store
//! - [`config`]: layered runtime settings

pub mod config;
pub mod services;
pub mod store;

mod integration_tests;

pub use config::Settings;
pub use services::{
    BusinessService, BusinessView, CatalogError, CatalogResult, CollectionHierarchyManager,
    ItemService, UserDirectory, UserView,
};
pub use store::{CatalogStore, CatalogTx, InMemoryCatalogStore, SqliteCatalogStore, StoreError};
