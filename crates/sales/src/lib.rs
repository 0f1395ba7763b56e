//! Point-of-sale inventory transactions.
//!
//! Sales debit the selling scope's stock in one all-or-nothing unit of
//! work; refunds credit it back as `return` movements. Both report records
//! that end below the low-stock threshold to a [`StockAlertNotifier`].

pub mod commands;
pub mod coordinator;
pub mod error;
pub mod services;

pub use commands::{RefundCommand, SaleCommand, SaleLine};
pub use coordinator::{SaleReceipt, SaleTransactionCoordinator};
pub use error::{Result, SaleError};
pub use services::{InMemoryStockAlertNotifier, StockAlert, StockAlertNotifier};
