//! Sale error types.

use common::{SaleId, VariantId};
use domain::{AccessDenied, LedgerError};
use inventory_store::StoreError;
use thiserror::Error;

/// Errors that can occur while recording sales and refunds.
#[derive(Debug, Error)]
pub enum SaleError {
    /// The request itself is malformed.
    #[error("Invalid sale request: {0}")]
    InvalidRequest(String),

    /// The caller lacks the role or scope the operation requires.
    #[error("Forbidden: {0}")]
    Forbidden(AccessDenied),

    #[error(
        "Refund of {requested} exceeds refundable quantity {refundable} for variant {variant_id} on sale {sale_id}"
    )]
    RefundExceedsSold {
        sale_id: SaleId,
        variant_id: VariantId,
        requested: i64,
        refundable: i64,
    },

    /// Low-stock notifier error.
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// Ledger or store error.
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl SaleError {
    /// Returns true when a line could not be covered by available stock.
    pub fn is_capacity(&self) -> bool {
        matches!(self, SaleError::Ledger(e) if e.is_capacity())
    }
}

impl From<LedgerError> for SaleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Forbidden(denied) => SaleError::Forbidden(denied),
            other => SaleError::Ledger(other),
        }
    }
}

impl From<StoreError> for SaleError {
    fn from(err: StoreError) -> Self {
        SaleError::Ledger(LedgerError::Store(err))
    }
}

/// Convenience type alias for sale results.
pub type Result<T> = std::result::Result<T, SaleError>;
