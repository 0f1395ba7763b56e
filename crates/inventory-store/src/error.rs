use common::{BillId, OwnerScope, VariantId};
use thiserror::Error;

use crate::{Reference, Version};

/// Errors that can occur when reading or writing the inventory store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Not enough available stock (`stock - reserved`) for a removal or reservation.
    #[error(
        "Insufficient stock for variant {variant_id} in {scope}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        variant_id: VariantId,
        scope: OwnerScope,
        requested: i64,
        available: i64,
    },

    /// A release asked for more than is reserved while the strict policy is active.
    #[error(
        "Cannot release {requested} units of variant {variant_id} in {scope}: only {reserved} reserved"
    )]
    ReleaseExceedsReserved {
        variant_id: VariantId,
        scope: OwnerScope,
        requested: i64,
        reserved: i64,
    },

    /// An addition would push a counter past `i64::MAX`.
    #[error("Stock counter overflow for variant {variant_id} in {scope}: {current} + {quantity}")]
    CounterOverflow {
        variant_id: VariantId,
        scope: OwnerScope,
        current: i64,
        quantity: i64,
    },

    /// The unit would push a reference's net stock change on one record past its limit.
    #[error(
        "Net stock change for {reference:?} on variant {variant_id} in {scope} exceeds {max_net}: committed {committed}, requested {requested}"
    )]
    NetLimitExceeded {
        reference: Reference,
        variant_id: VariantId,
        scope: OwnerScope,
        committed: i64,
        requested: i64,
        max_net: i64,
    },

    /// Quantities handed to the store must never be negative.
    #[error("Invalid quantity {quantity} for variant {variant_id}")]
    InvalidQuantity { variant_id: VariantId, quantity: i64 },

    /// The record has been deactivated and accepts no mutations.
    #[error("Inventory record for variant {variant_id} in {scope} is inactive")]
    InactiveRecord {
        variant_id: VariantId,
        scope: OwnerScope,
    },

    #[error("Inventory record not found for variant {variant_id} in {scope}")]
    RecordNotFound {
        variant_id: VariantId,
        scope: OwnerScope,
    },

    /// Two writers raced to create the same record; the caller should retry.
    #[error("Concurrent creation of inventory record for variant {variant_id} in {scope}")]
    RecordConflict {
        variant_id: VariantId,
        scope: OwnerScope,
    },

    /// The bill was modified since it was read.
    #[error("Concurrency conflict for bill {bill_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        bill_id: BillId,
        expected: Version,
        actual: Version,
    },

    /// The exit bill is already linked to an entry bill.
    #[error("Exit bill {exit_bill_id} already has an entry bill")]
    DuplicateEntryBill { exit_bill_id: BillId },

    /// The unit of work itself is malformed.
    #[error("Invalid unit of work: {0}")]
    InvalidUnitOfWork(String),

    /// A stored value could not be decoded.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true for capacity failures, which are ordinary business outcomes.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            StoreError::InsufficientStock { .. }
                | StoreError::ReleaseExceedsReserved { .. }
                | StoreError::NetLimitExceeded { .. }
        )
    }

    /// Returns true for errors the caller may resolve by re-reading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::RecordConflict { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
