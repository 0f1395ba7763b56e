//! Transfer error types.

use common::{BillId, BillItemId, CompanyId, FranchiseId, VariantId};
use domain::{AccessDenied, LedgerError};
use inventory_store::{BillStatus, BillType, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What is wrong with one requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// The request carries no lines at all.
    NoItems,
    ZeroQuantity,
    /// The variant already appears on an earlier line.
    DuplicateVariant,
    /// The variant is not in the catalog.
    UnknownVariant,
    /// The line refers to an item the bill does not have.
    UnknownLine { item_id: BillItemId },
    /// The item is referenced by more than one line.
    DuplicateLine { item_id: BillItemId },
    InsufficientStock { requested: i64, available: i64 },
}

/// One failing line of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineIssue {
    /// Zero-based position in the request.
    pub line: usize,
    pub variant_id: Option<VariantId>,
    pub kind: IssueKind,
}

impl std::fmt::Display for LineIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IssueKind::NoItems => return f.write_str("request has no items"),
            IssueKind::ZeroQuantity => write!(f, "line {}: quantity must be positive", self.line)?,
            IssueKind::DuplicateVariant => write!(f, "line {}: duplicate variant", self.line)?,
            IssueKind::UnknownVariant => write!(f, "line {}: unknown variant", self.line)?,
            IssueKind::UnknownLine { item_id } => {
                write!(f, "line {}: unknown bill item {item_id}", self.line)?
            }
            IssueKind::DuplicateLine { item_id } => {
                write!(f, "line {}: bill item {item_id} referenced twice", self.line)?
            }
            IssueKind::InsufficientStock {
                requested,
                available,
            } => write!(
                f,
                "line {}: insufficient stock (requested {requested}, available {available})",
                self.line
            )?,
        }
        if let Some(variant_id) = self.variant_id {
            write!(f, " [{variant_id}]")?;
        }
        Ok(())
    }
}

/// Every issue found in a request, so the caller can fix them all at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<LineIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: usize, variant_id: Option<VariantId>, kind: IssueKind) {
        self.issues.push(LineIssue {
            line,
            variant_id,
            kind,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `Err` carrying this report when any issue was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TransferError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

/// Errors that can occur during transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// One or more request lines failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// The caller lacks the role or scope the operation requires.
    #[error("Forbidden: {0}")]
    Forbidden(AccessDenied),

    #[error("Bill not found: {0}")]
    BillNotFound(BillId),

    #[error("Bill {bill_id} is an {actual} bill, expected {expected}")]
    WrongBillType {
        bill_id: BillId,
        expected: BillType,
        actual: BillType,
    },

    /// The bill's status does not allow the requested action.
    #[error("Cannot {action} bill {bill_id} in status {status}")]
    InvalidTransition {
        bill_id: BillId,
        status: BillStatus,
        action: &'static str,
    },

    #[error("Exit bill {exit_bill_id} is {status}, expected completed")]
    ExitBillNotCompleted {
        exit_bill_id: BillId,
        status: BillStatus,
    },

    #[error("Exit bill {exit_bill_id} already has entry bill {entry_bill_id}")]
    EntryBillExists {
        exit_bill_id: BillId,
        entry_bill_id: BillId,
    },

    #[error("Exit bill {exit_bill_id} ships to franchise {expected}, not {actual}")]
    FranchiseMismatch {
        exit_bill_id: BillId,
        expected: FranchiseId,
        actual: FranchiseId,
    },

    #[error("Franchise {franchise_id} does not belong to company {company_id}")]
    FranchiseNotInCompany {
        franchise_id: FranchiseId,
        company_id: CompanyId,
    },

    /// Catalog service error.
    #[error("Catalog service error: {0}")]
    CatalogService(String),

    /// Ledger or store error.
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl TransferError {
    /// Returns true for insufficient-stock outcomes, whether caught during
    /// validation or at the reservation itself.
    pub fn is_capacity(&self) -> bool {
        match self {
            TransferError::Validation(report) => report
                .issues
                .iter()
                .any(|i| matches!(i.kind, IssueKind::InsufficientStock { .. })),
            TransferError::Ledger(e) => e.is_capacity(),
            _ => false,
        }
    }

    /// Returns true when a concurrent writer changed the bill or record first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransferError::Ledger(LedgerError::Store(e)) if e.is_conflict())
    }
}

impl From<LedgerError> for TransferError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Forbidden(denied) => TransferError::Forbidden(denied),
            LedgerError::FranchiseNotInCompany {
                franchise_id,
                company_id,
            } => TransferError::FranchiseNotInCompany {
                franchise_id,
                company_id,
            },
            other => TransferError::Ledger(other),
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        TransferError::Ledger(LedgerError::Store(err))
    }
}

impl From<domain::TenancyError> for TransferError {
    fn from(err: domain::TenancyError) -> Self {
        TransferError::Ledger(LedgerError::Tenancy(err))
    }
}

/// Convenience type alias for transfer results.
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_every_issue() {
        let mut report = ValidationReport::new();
        report.push(0, None, IssueKind::ZeroQuantity);
        report.push(
            2,
            None,
            IssueKind::InsufficientStock {
                requested: 5,
                available: 1,
            },
        );

        let err = report.clone().into_result().unwrap_err();
        assert!(err.is_capacity());
        let text = err.to_string();
        assert!(text.contains("2 issue(s)"));
        assert!(text.contains("line 2: insufficient stock (requested 5, available 1)"));
    }

    #[test]
    fn empty_report_passes() {
        assert!(ValidationReport::new().into_result().is_ok());
    }

    #[test]
    fn ledger_forbidden_becomes_forbidden() {
        let denied = AccessDenied::InsufficientRole {
            required: common::Role::Manager,
            actual: common::Role::Employee,
        };
        let err: TransferError = LedgerError::Forbidden(denied.clone()).into();
        assert!(matches!(err, TransferError::Forbidden(d) if d == denied));
    }
}
