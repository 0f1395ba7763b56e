//! Inventory records and the counter arithmetic that guards their invariants.

use chrono::{DateTime, Utc};
use common::{InventoryId, OwnerScope, VariantId};
use serde::{Deserialize, Serialize};

use crate::{Counter, StoreError};

/// Stock counters for one variant within one owner scope.
///
/// After every successful mutation `0 <= reserved_stock <= stock` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryId,
    pub variant_id: VariantId,
    pub scope: OwnerScope,
    pub stock: i64,
    pub reserved_stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A counter mutation requested against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockOperation {
    /// Increase physical stock.
    Add,
    /// Decrease physical stock, bounded by available stock.
    Remove,
    /// Hold available stock without moving it.
    Reserve,
    /// Drop a previously made hold.
    Release,
}

/// What to do when a release asks for more than is currently reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Treat the release as a no-op.
    #[default]
    Lenient,
    /// Fail with [`StoreError::ReleaseExceedsReserved`].
    Strict,
}

/// Snapshot of the counter a successful operation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterChange {
    pub counter: Counter,
    pub previous: i64,
    pub new: i64,
}

impl CounterChange {
    /// Signed delta of the change.
    pub fn delta(&self) -> i64 {
        self.new - self.previous
    }
}

impl InventoryRecord {
    /// Creates an empty, active record.
    pub fn new(variant_id: VariantId, scope: OwnerScope) -> Self {
        let now = Utc::now();
        Self {
            id: InventoryId::new(),
            variant_id,
            scope,
            stock: 0,
            reserved_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stock that may still be reserved or sold.
    pub fn available(&self) -> i64 {
        self.stock - self.reserved_stock
    }

    /// Applies one operation.
    ///
    /// Returns `Ok(None)` when the operation is a no-op (zero quantity, or a
    /// lenient over-release) and leaves the record untouched on error.
    pub fn apply(
        &mut self,
        operation: StockOperation,
        quantity: i64,
        policy: ReleasePolicy,
    ) -> Result<Option<CounterChange>, StoreError> {
        if quantity < 0 {
            return Err(StoreError::InvalidQuantity {
                variant_id: self.variant_id,
                quantity,
            });
        }
        if quantity == 0 {
            return Ok(None);
        }
        if !self.is_active {
            return Err(StoreError::InactiveRecord {
                variant_id: self.variant_id,
                scope: self.scope,
            });
        }

        let change = match operation {
            StockOperation::Add => {
                let previous = self.stock;
                self.stock =
                    previous
                        .checked_add(quantity)
                        .ok_or(StoreError::CounterOverflow {
                            variant_id: self.variant_id,
                            scope: self.scope,
                            current: previous,
                            quantity,
                        })?;
                CounterChange {
                    counter: Counter::Stock,
                    previous,
                    new: self.stock,
                }
            }
            StockOperation::Remove => {
                self.ensure_available(quantity)?;
                let previous = self.stock;
                self.stock -= quantity;
                CounterChange {
                    counter: Counter::Stock,
                    previous,
                    new: self.stock,
                }
            }
            StockOperation::Reserve => {
                self.ensure_available(quantity)?;
                let previous = self.reserved_stock;
                self.reserved_stock += quantity;
                CounterChange {
                    counter: Counter::Reserved,
                    previous,
                    new: self.reserved_stock,
                }
            }
            StockOperation::Release => {
                if self.reserved_stock < quantity {
                    return match policy {
                        ReleasePolicy::Lenient => Ok(None),
                        ReleasePolicy::Strict => Err(StoreError::ReleaseExceedsReserved {
                            variant_id: self.variant_id,
                            scope: self.scope,
                            requested: quantity,
                            reserved: self.reserved_stock,
                        }),
                    };
                }
                let previous = self.reserved_stock;
                self.reserved_stock -= quantity;
                CounterChange {
                    counter: Counter::Reserved,
                    previous,
                    new: self.reserved_stock,
                }
            }
        };

        self.updated_at = Utc::now();
        Ok(Some(change))
    }

    fn ensure_available(&self, quantity: i64) -> Result<(), StoreError> {
        if self.available() < quantity {
            return Err(StoreError::InsufficientStock {
                variant_id: self.variant_id,
                scope: self.scope,
                requested: quantity,
                available: self.available(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CompanyId;

    fn record_with(stock: i64, reserved: i64) -> InventoryRecord {
        let mut record = InventoryRecord::new(VariantId::new(), CompanyId::new().into());
        record.stock = stock;
        record.reserved_stock = reserved;
        record
    }

    #[test]
    fn add_increments_stock() {
        let mut record = record_with(3, 0);
        let change = record
            .apply(StockOperation::Add, 4, ReleasePolicy::Lenient)
            .unwrap()
            .unwrap();
        assert_eq!(record.stock, 7);
        assert_eq!(change.counter, Counter::Stock);
        assert_eq!((change.previous, change.new), (3, 7));
    }

    #[test]
    fn zero_quantity_is_noop() {
        let mut record = record_with(5, 2);
        for op in [
            StockOperation::Add,
            StockOperation::Remove,
            StockOperation::Reserve,
            StockOperation::Release,
        ] {
            assert!(record.apply(op, 0, ReleasePolicy::Strict).unwrap().is_none());
        }
        assert_eq!((record.stock, record.reserved_stock), (5, 2));
    }

    #[test]
    fn remove_is_bounded_by_available() {
        let mut record = record_with(10, 6);
        let err = record
            .apply(StockOperation::Remove, 5, ReleasePolicy::Lenient)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 5,
                available: 4,
                ..
            }
        ));
        assert_eq!(record.stock, 10);

        record
            .apply(StockOperation::Remove, 4, ReleasePolicy::Lenient)
            .unwrap();
        assert_eq!(record.stock, 6);
        assert_eq!(record.available(), 0);
    }

    #[test]
    fn reserve_narrows_availability_only() {
        let mut record = record_with(10, 0);
        record
            .apply(StockOperation::Reserve, 10, ReleasePolicy::Lenient)
            .unwrap();
        assert_eq!(record.stock, 10);
        assert_eq!(record.reserved_stock, 10);
        assert_eq!(record.available(), 0);
        assert!(record
            .apply(StockOperation::Reserve, 1, ReleasePolicy::Lenient)
            .is_err());
    }

    #[test]
    fn over_release_follows_policy() {
        let mut record = record_with(10, 2);
        assert!(record
            .apply(StockOperation::Release, 3, ReleasePolicy::Lenient)
            .unwrap()
            .is_none());
        assert_eq!(record.reserved_stock, 2);

        let err = record
            .apply(StockOperation::Release, 3, ReleasePolicy::Strict)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ReleaseExceedsReserved { reserved: 2, .. }
        ));
    }

    #[test]
    fn inactive_record_rejects_mutations() {
        let mut record = record_with(10, 0);
        record.is_active = false;
        assert!(matches!(
            record.apply(StockOperation::Add, 1, ReleasePolicy::Lenient),
            Err(StoreError::InactiveRecord { .. })
        ));
    }

    #[test]
    fn add_past_max_overflows_without_touching_record() {
        let mut record = record_with(i64::MAX, 3);
        let err = record
            .apply(StockOperation::Add, 1, ReleasePolicy::Lenient)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::CounterOverflow {
                current: i64::MAX,
                quantity: 1,
                ..
            }
        ));
        assert_eq!((record.stock, record.reserved_stock), (i64::MAX, 3));

        // The largest representable total still fits
        let mut record = record_with(i64::MAX - 5, 0);
        record
            .apply(StockOperation::Add, 5, ReleasePolicy::Lenient)
            .unwrap();
        assert_eq!(record.stock, i64::MAX);
        assert_eq!(record.available(), i64::MAX);
    }

    #[test]
    fn negative_quantity_rejected() {
        let mut record = record_with(10, 0);
        assert!(matches!(
            record.apply(StockOperation::Add, -1, ReleasePolicy::Lenient),
            Err(StoreError::InvalidQuantity { quantity: -1, .. })
        ));
    }
}
