//! External collaborators used by the transfer orchestrator.

pub mod catalog;

pub use catalog::{CatalogEntry, CatalogService, InMemoryCatalogService};
