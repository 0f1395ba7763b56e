//! Persistence for the inventory ledger.
//!
//! This crate owns the stored shapes (inventory records, the append-only
//! movement log, warehouse bills) and the [`InventoryStore`] trait whose
//! single write path, [`InventoryStore::commit`], applies a unit of work
//! atomically. Two implementations are provided: an in-memory store for
//! tests and a PostgreSQL store backed by sqlx.

pub mod bill;
pub mod error;
pub mod memory;
pub mod movement;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use bill::{
    BillStatus, BillType, DiscrepancyType, VerificationStatus, Version, WarehouseBill,
    WarehouseBillItem,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryInventoryStore;
pub use movement::{Counter, InventoryMovement, MovementType, Reference, ReferenceType};
pub use postgres::PostgresInventoryStore;
pub use query::{BillQuery, MovementQuery};
pub use record::{CounterChange, InventoryRecord, ReleasePolicy, StockOperation};
pub use store::{
    BillWrite, CommitOptions, CommitReceipt, InventoryStore, NetStockLimit, StockChange,
    UnitOfWork,
};
