//! Ledger error types.

use common::{CompanyId, FranchiseId};
use inventory_store::StoreError;
use thiserror::Error;

use crate::{AccessDenied, TenancyError};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The store rejected or failed the operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The caller lacks the role or scope the operation requires.
    #[error("Forbidden: {0}")]
    Forbidden(#[from] AccessDenied),

    #[error("Tenancy lookup failed: {0}")]
    Tenancy(#[from] TenancyError),

    #[error("Unknown franchise: {0}")]
    UnknownFranchise(FranchiseId),

    #[error("Franchise {franchise_id} does not belong to company {company_id}")]
    FranchiseNotInCompany {
        franchise_id: FranchiseId,
        company_id: CompanyId,
    },
}

impl LedgerError {
    /// Returns true if the failure is an ordinary capacity outcome.
    pub fn is_capacity(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.is_capacity())
    }
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;
