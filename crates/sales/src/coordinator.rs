//! Sale transaction coordinator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::{ActorContext, Role, SaleId, VariantId};
use domain::{InventoryLedger, LedgerError};
use inventory_store::{
    InventoryMovement, InventoryRecord, InventoryStore, MovementQuery, MovementType,
    NetStockLimit, Reference, StockChange, StoreError, UnitOfWork,
};
use serde::Serialize;

use crate::commands::{RefundCommand, SaleCommand, SaleLine};
use crate::error::{Result, SaleError};
use crate::services::{StockAlert, StockAlertNotifier};

/// Outcome of a committed sale or refund.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub sale_id: SaleId,
    pub movements: Vec<InventoryMovement>,
    /// Variants whose stock ended below the low-stock threshold.
    pub low_stock: Vec<VariantId>,
}

/// Debits and credits a scope's inventory for point-of-sale transactions.
///
/// A sale is one unit of work: any line that cannot be covered aborts the
/// whole sale. Low-stock alerts are sent after the commit and never affect
/// its outcome.
pub struct SaleTransactionCoordinator<S, N>
where
    S: InventoryStore,
    N: StockAlertNotifier,
{
    ledger: Arc<InventoryLedger<S>>,
    notifier: N,
}

impl<S, N> SaleTransactionCoordinator<S, N>
where
    S: InventoryStore,
    N: StockAlertNotifier,
{
    pub fn new(ledger: Arc<InventoryLedger<S>>, notifier: N) -> Self {
        Self { ledger, notifier }
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Removes every sold line from stock as a `sale` movement.
    #[tracing::instrument(
        skip(self, actor, cmd),
        fields(sale_id = %cmd.sale_id, scope = %cmd.scope, lines = cmd.lines.len())
    )]
    pub async fn record_sale(&self, actor: &ActorContext, cmd: SaleCommand) -> Result<SaleReceipt> {
        self.ledger
            .authorize(actor, Role::Employee, cmd.scope)
            .await?;
        validate_lines(&cmd.lines)?;

        let reference = Reference::sale(cmd.sale_id);
        let unit = UnitOfWork::new(actor.user_id).changes(cmd.lines.iter().map(|line| {
            StockChange::remove(
                line.variant_id,
                cmd.scope,
                i64::from(line.quantity),
                MovementType::Sale,
            )
            .with_reference(reference)
        }));

        let receipt = self.ledger.commit(unit).await.inspect_err(|e| {
            if e.is_capacity() {
                tracing::warn!(error = %e, "sale rejected");
            }
        })?;

        metrics::counter!("sales_total").increment(1);
        tracing::info!(movements = receipt.movements.len(), "sale recorded");

        let low_stock = self.check_low_stock(&receipt.records).await;
        Ok(SaleReceipt {
            sale_id: cmd.sale_id,
            movements: receipt.movements,
            low_stock,
        })
    }

    /// Returns sold units to stock as `return` movements.
    ///
    /// Each line is capped at the quantity sold minus what was already
    /// refunded for the same sale and variant. The history read gives the
    /// caller an early answer; the cap itself is enforced by the store under
    /// the record lock, so concurrent refunds of one sale cannot overshoot it.
    #[tracing::instrument(
        skip(self, actor, cmd),
        fields(sale_id = %cmd.sale_id, scope = %cmd.scope, lines = cmd.lines.len())
    )]
    pub async fn refund(&self, actor: &ActorContext, cmd: RefundCommand) -> Result<SaleReceipt> {
        self.ledger
            .authorize(actor, Role::Manager, cmd.scope)
            .await?;
        validate_lines(&cmd.lines)?;

        let reference = Reference::sale(cmd.sale_id);
        let history = self
            .ledger
            .movement_history(MovementQuery::for_reference(reference).scope(cmd.scope))
            .await?;
        let refundable = refundable_quantities(&history);

        for line in &cmd.lines {
            let requested = i64::from(line.quantity);
            let available = refundable.get(&line.variant_id).copied().unwrap_or(0);
            if requested > available {
                return Err(SaleError::RefundExceedsSold {
                    sale_id: cmd.sale_id,
                    variant_id: line.variant_id,
                    requested,
                    refundable: available,
                });
            }
        }

        let mut unit = UnitOfWork::new(actor.user_id);
        for line in &cmd.lines {
            unit = unit
                .change(
                    StockChange::add(
                        line.variant_id,
                        cmd.scope,
                        i64::from(line.quantity),
                        MovementType::Return,
                    )
                    .with_reference(reference)
                    .with_note(cmd.reason.clone()),
                )
                .limit(NetStockLimit::new(reference, line.variant_id, cmd.scope, 0));
        }
        let receipt = self
            .ledger
            .commit(unit)
            .await
            .map_err(|e| refund_rejection(cmd.sale_id, e))?;

        metrics::counter!("refunds_total").increment(1);
        tracing::info!(movements = receipt.movements.len(), "refund recorded");

        let low_stock = self.check_low_stock(&receipt.records).await;
        Ok(SaleReceipt {
            sale_id: cmd.sale_id,
            movements: receipt.movements,
            low_stock,
        })
    }

    async fn check_low_stock(&self, records: &[InventoryRecord]) -> Vec<VariantId> {
        let threshold = self.ledger.config().low_stock_threshold;
        let mut flagged = Vec::new();

        for record in records.iter().filter(|r| r.stock < threshold) {
            metrics::counter!("low_stock_alerts_total").increment(1);
            flagged.push(record.variant_id);

            let alert = StockAlert {
                variant_id: record.variant_id,
                scope: record.scope,
                stock: record.stock,
                threshold,
            };
            if let Err(e) = self.notifier.notify(alert).await {
                tracing::warn!(variant_id = %record.variant_id, error = %e, "low-stock alert not delivered");
            }
        }

        flagged
    }
}

fn validate_lines(lines: &[SaleLine]) -> Result<()> {
    if lines.is_empty() {
        return Err(SaleError::InvalidRequest("no lines".to_string()));
    }
    let mut seen = HashSet::new();
    for (index, line) in lines.iter().enumerate() {
        if line.quantity == 0 {
            return Err(SaleError::InvalidRequest(format!(
                "line {index}: quantity must be positive"
            )));
        }
        if !seen.insert(line.variant_id) {
            return Err(SaleError::InvalidRequest(format!(
                "line {index}: duplicate variant {}",
                line.variant_id
            )));
        }
    }
    Ok(())
}

/// Reports a cap hit inside the commit the same way as one caught up front.
fn refund_rejection(sale_id: SaleId, err: LedgerError) -> SaleError {
    match err {
        LedgerError::Store(StoreError::NetLimitExceeded {
            variant_id,
            committed,
            requested,
            max_net,
            ..
        }) => {
            tracing::warn!(%variant_id, requested, "refund lost a race for the remaining quantity");
            SaleError::RefundExceedsSold {
                sale_id,
                variant_id,
                requested,
                refundable: max_net.saturating_sub(committed).max(0),
            }
        }
        other => other.into(),
    }
}

/// Sold minus already returned, per variant, from a sale's movements.
fn refundable_quantities(history: &[InventoryMovement]) -> HashMap<VariantId, i64> {
    let mut refundable: HashMap<VariantId, i64> = HashMap::new();
    // Sales are negative on the stock counter, returns positive
    for movement in history
        .iter()
        .filter(|m| matches!(m.movement_type, MovementType::Sale | MovementType::Return))
    {
        *refundable.entry(movement.variant_id).or_default() -= movement.quantity;
    }
    refundable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_zero_and_duplicate_lines() {
        let variant = VariantId::new();
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[SaleLine::new(variant, 0)]).is_err());
        assert!(
            validate_lines(&[SaleLine::new(variant, 1), SaleLine::new(variant, 2)]).is_err()
        );
        assert!(validate_lines(&[SaleLine::new(variant, 1)]).is_ok());
    }
}
