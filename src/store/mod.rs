//! Durable storage: the reading store (owned, mutable) and the catalog
//! store (read-mostly, owned by an external collaborator).

pub mod catalog;
pub mod reading;

#[cfg(test)]
pub mod fakes;

pub use catalog::{CatalogStore, PgCatalogStore};
pub use reading::{PgReadingStore, ReadingStore};
