//! Low-stock notifier trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{OwnerScope, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::SaleError;

/// Raised when a record's stock drops below the configured threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub variant_id: VariantId,
    pub scope: OwnerScope,
    pub stock: i64,
    pub threshold: i64,
}

/// Receives low-stock alerts. Delivery has no bearing on ledger state.
#[async_trait]
pub trait StockAlertNotifier: Send + Sync {
    async fn notify(&self, alert: StockAlert) -> Result<(), SaleError>;
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    alerts: Vec<StockAlert>,
    fail_on_notify: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockAlertNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryStockAlertNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every delivery.
    pub fn set_fail_on_notify(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_notify = fail;
    }

    pub fn alerts(&self) -> Vec<StockAlert> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .alerts
            .clone()
    }

    pub fn alert_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .alerts
            .len()
    }
}

#[async_trait]
impl StockAlertNotifier for InMemoryStockAlertNotifier {
    async fn notify(&self, alert: StockAlert) -> Result<(), SaleError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_notify {
            return Err(SaleError::Notifier("alert channel unavailable".to_string()));
        }
        state.alerts.push(alert);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CompanyId;

    fn alert() -> StockAlert {
        StockAlert {
            variant_id: VariantId::new(),
            scope: OwnerScope::Company(CompanyId::new()),
            stock: 2,
            threshold: 5,
        }
    }

    #[tokio::test]
    async fn test_records_alerts() {
        let notifier = InMemoryStockAlertNotifier::new();
        let sent = alert();
        notifier.notify(sent.clone()).await.unwrap();

        assert_eq!(notifier.alert_count(), 1);
        assert_eq!(notifier.alerts()[0], sent);
    }

    #[tokio::test]
    async fn test_fail_on_notify() {
        let notifier = InMemoryStockAlertNotifier::new();
        notifier.set_fail_on_notify(true);

        let result = notifier.notify(alert()).await;
        assert!(matches!(result, Err(SaleError::Notifier(_))));
        assert_eq!(notifier.alert_count(), 0);
    }
}
