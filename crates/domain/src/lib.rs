//! Domain layer for the inventory ledger.
//!
//! This crate provides:
//! - `InventoryLedger`, the only component that issues stock changes
//! - Ledger configuration loaded from the environment
//! - Capability checks against the caller's role and scope
//! - The tenancy collaborator that maps franchises to companies
//! - Pure entry-bill reconciliation

pub mod access;
pub mod config;
pub mod error;
pub mod ledger;
pub mod reconcile;
pub mod tenancy;

pub use access::{AccessDenied, require};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::{Annotation, InventoryLedger};
pub use reconcile::{ReceivedItem, Reconciliation, reconcile_entry_items};
pub use tenancy::{InMemoryTenancyDirectory, TenancyDirectory, TenancyError};
