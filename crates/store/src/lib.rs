//! Transactional persistence for the marketplace settlement pipeline.
//!
//! [`MarketplaceStore`] serves plain reads and opens [`UnitOfWork`]s for
//! every multi-row mutation. Two implementations are provided:
//! - [`InMemoryMarketplaceStore`] for tests and local runs
//! - [`PostgresMarketplaceStore`] backed by row locks in PostgreSQL

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryMarketplaceStore;
pub use postgres::PostgresMarketplaceStore;
pub use store::{MarketplaceStore, UnitOfWork};
