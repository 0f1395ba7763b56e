//! Company-to-franchise stock transfers.
//!
//! A transfer is carried by two warehouse bills:
//! 1. An exit bill reserves company stock, then ships it (release + transfer out).
//! 2. An entry bill for the completed exit bill records what arrived,
//!    then credits the franchise with the received quantities.
//!
//! Each step commits atomically. A draft exit bill can be cancelled, which
//! releases its reservations; nothing else is compensated.

pub mod commands;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod services;

pub use commands::{
    CancelWarehouseBill, CompleteEntryBill, CompleteExitBill, CreateEntryBill, CreateExitBill,
    ExitLine, ExitLineUpdate, UpdateExitBillItems, VerifyEntryBill,
};
pub use error::{IssueKind, LineIssue, Result, TransferError, ValidationReport};
pub use orchestrator::TransferOrchestrator;
pub use report::{DiscrepancyLine, DiscrepancyReport};
pub use services::{CatalogEntry, CatalogService, InMemoryCatalogService};
