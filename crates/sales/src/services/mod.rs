//! External collaborators used by the sale coordinator.

pub mod notifier;

pub use notifier::{InMemoryStockAlertNotifier, StockAlert, StockAlertNotifier};
