use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use common::{BillId, OwnerScope, VariantId};
use tokio::sync::RwLock;

use crate::store::{
    RecordKey, WorkingRecord, apply_changes, lock_order, record_commit_metrics,
    validate_unit_of_work,
};
use crate::{
    BillQuery, BillType, BillWrite, CommitOptions, CommitReceipt, InventoryMovement,
    InventoryRecord, InventoryStore, MovementQuery, Result, StoreError, UnitOfWork,
    WarehouseBill,
};

#[derive(Debug, Default)]
struct State {
    records: HashMap<RecordKey, InventoryRecord>,
    movements: Vec<InventoryMovement>,
    bills: HashMap<BillId, WarehouseBill>,
}

impl State {
    fn entry_bill_for(&self, exit_bill_id: BillId) -> Option<&WarehouseBill> {
        self.bills.values().find(|b| {
            b.bill_type == BillType::Entry && b.related_bill_id == Some(exit_bill_id)
        })
    }

    fn check_bill_write(&self, write: &BillWrite) -> Result<()> {
        let actual = self
            .bills
            .get(&write.bill.id)
            .map(|b| b.version)
            .unwrap_or_default();
        if actual != write.expected_version {
            return Err(StoreError::ConcurrencyConflict {
                bill_id: write.bill.id,
                expected: write.expected_version,
                actual,
            });
        }

        if write.bill.bill_type == BillType::Entry
            && let Some(exit_bill_id) = write.bill.related_bill_id
            && let Some(existing) = self.entry_bill_for(exit_bill_id)
            && existing.id != write.bill.id
        {
            return Err(StoreError::DuplicateEntryBill { exit_bill_id });
        }

        Ok(())
    }
}

/// In-memory inventory store for tests and local runs.
///
/// A single write lock serialises commits, which gives the same isolation a
/// row lock gives in PostgreSQL.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of movements written.
    pub async fn movement_count(&self) -> usize {
        self.state.read().await.movements.len()
    }

    /// Total number of records across all scopes.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn commit(&self, unit: UnitOfWork, options: CommitOptions) -> Result<CommitReceipt> {
        validate_unit_of_work(&unit)?;
        let started = Instant::now();

        let mut state = self.state.write().await;
        let now = Utc::now();

        let mut working: BTreeMap<RecordKey, WorkingRecord> = lock_order(&unit.changes)
            .into_iter()
            .map(|key| {
                let entry = match state.records.get(&key) {
                    Some(record) => WorkingRecord::existing(record.clone()),
                    None => WorkingRecord::missing(key),
                };
                (key, entry)
            })
            .collect();

        let movements = apply_changes(
            &mut working,
            &unit.changes,
            options.release_policy,
            unit.actor,
            now,
        )?;

        for limit in &unit.limits {
            let committed: i64 = state
                .movements
                .iter()
                .filter(|m| limit.covers(m))
                .map(|m| m.quantity)
                .sum();
            limit.check(committed, &movements)?;
        }

        for write in &unit.bills {
            state.check_bill_write(write)?;
        }

        // Everything validated; apply.
        let mut records = Vec::new();
        for (key, entry) in working {
            if entry.dirty {
                state.records.insert(key, entry.record.clone());
                records.push(entry.record);
            }
        }

        let mut bills = Vec::with_capacity(unit.bills.len());
        for write in unit.bills {
            let mut bill = write.bill;
            bill.version = write.expected_version.next();
            bill.updated_at = now;
            state.bills.insert(bill.id, bill.clone());
            bills.push(bill);
        }

        state.movements.extend(movements.iter().cloned());
        drop(state);

        record_commit_metrics(&movements, started);

        Ok(CommitReceipt {
            movements,
            records,
            bills,
        })
    }

    async fn get_record(
        &self,
        variant_id: VariantId,
        scope: OwnerScope,
    ) -> Result<Option<InventoryRecord>> {
        let state = self.state.read().await;
        Ok(state.records.get(&(variant_id, scope)).cloned())
    }

    async fn list_records(&self, scope: OwnerScope) -> Result<Vec<InventoryRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|r| r.scope == scope)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn ensure_records(
        &self,
        scope: OwnerScope,
        variants: &[VariantId],
    ) -> Result<Vec<InventoryRecord>> {
        let mut state = self.state.write().await;
        let mut created = Vec::new();
        for &variant_id in variants {
            let key = (variant_id, scope);
            if state.records.contains_key(&key) {
                continue;
            }
            let record = InventoryRecord::new(variant_id, scope);
            state.records.insert(key, record.clone());
            created.push(record);
        }
        Ok(created)
    }

    async fn set_record_active(
        &self,
        variant_id: VariantId,
        scope: OwnerScope,
        active: bool,
    ) -> Result<InventoryRecord> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&(variant_id, scope))
            .ok_or(StoreError::RecordNotFound { variant_id, scope })?;
        record.is_active = active;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn get_bill(&self, bill_id: BillId) -> Result<Option<WarehouseBill>> {
        let state = self.state.read().await;
        Ok(state.bills.get(&bill_id).cloned())
    }

    async fn find_entry_bill(&self, exit_bill_id: BillId) -> Result<Option<WarehouseBill>> {
        let state = self.state.read().await;
        Ok(state.entry_bill_for(exit_bill_id).cloned())
    }

    async fn query_bills(&self, query: BillQuery) -> Result<Vec<WarehouseBill>> {
        let state = self.state.read().await;
        let mut bills: Vec<_> = state
            .bills
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        bills.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(bills.into_iter().skip(offset).take(limit).collect())
    }

    async fn query_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>> {
        let state = self.state.read().await;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(state
            .movements
            .iter()
            .filter(|m| query.matches(m))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BillStatus, Counter, MovementType, NetStockLimit, Reference, ReleasePolicy, StockChange,
        Version, WarehouseBillItem,
    };
    use common::{CompanyId, FranchiseId, Money, SaleId, UserId};

    fn company_scope() -> OwnerScope {
        CompanyId::new().into()
    }

    async fn seeded(store: &InMemoryInventoryStore, variant: VariantId, scope: OwnerScope) {
        store
            .commit(
                UnitOfWork::new(UserId::new()).change(StockChange::add(
                    variant,
                    scope,
                    10,
                    MovementType::Purchase,
                )),
                CommitOptions::default(),
            )
            .await
            .unwrap();
    }

    fn exit_bill(variant: VariantId, quantity: u32) -> WarehouseBill {
        WarehouseBill::draft(
            BillType::Exit,
            CompanyId::new(),
            FranchiseId::new(),
            vec![WarehouseBillItem::new(
                variant,
                quantity,
                Money::from_cents(100),
            )],
            UserId::new(),
        )
    }

    #[tokio::test]
    async fn add_creates_record_lazily() {
        let store = InMemoryInventoryStore::new();
        let variant = VariantId::new();
        let scope = company_scope();

        assert!(store.get_record(variant, scope).await.unwrap().is_none());
        seeded(&store, variant, scope).await;

        let record = store.get_record(variant, scope).await.unwrap().unwrap();
        assert_eq!(record.stock, 10);
        assert_eq!(record.reserved_stock, 0);
        assert_eq!(store.movement_count().await, 1);
    }

    #[tokio::test]
    async fn failed_change_rolls_back_whole_unit() {
        let store = InMemoryInventoryStore::new();
        let scope = company_scope();
        let a = VariantId::new();
        let b = VariantId::new();
        seeded(&store, a, scope).await;
        seeded(&store, b, scope).await;

        let bill = exit_bill(a, 5);
        let result = store
            .commit(
                UnitOfWork::new(UserId::new())
                    .change(StockChange::reserve(a, scope, 5))
                    .change(StockChange::reserve(b, scope, 11))
                    .bill(BillWrite::insert(bill.clone())),
                CommitOptions::default(),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 11,
                available: 10,
                ..
            })
        ));
        let record = store.get_record(a, scope).await.unwrap().unwrap();
        assert_eq!(record.reserved_stock, 0);
        assert!(store.get_bill(bill.id).await.unwrap().is_none());
        assert_eq!(store.movement_count().await, 2);
    }

    #[tokio::test]
    async fn net_limit_sees_earlier_commits_under_same_reference() {
        let store = InMemoryInventoryStore::new();
        let scope = company_scope();
        let variant = VariantId::new();
        let sale = Reference::sale(SaleId::new());
        seeded(&store, variant, scope).await;

        store
            .commit(
                UnitOfWork::new(UserId::new()).change(
                    StockChange::remove(variant, scope, 1, MovementType::Sale)
                        .with_reference(sale),
                ),
                CommitOptions::default(),
            )
            .await
            .unwrap();

        let give_back = || {
            UnitOfWork::new(UserId::new())
                .change(
                    StockChange::add(variant, scope, 1, MovementType::Return).with_reference(sale),
                )
                .limit(NetStockLimit::new(sale, variant, scope, 0))
        };
        store
            .commit(give_back(), CommitOptions::default())
            .await
            .unwrap();

        let result = store.commit(give_back(), CommitOptions::default()).await;
        assert!(matches!(
            result,
            Err(StoreError::NetLimitExceeded {
                committed: 0,
                requested: 1,
                ..
            })
        ));
        let record = store.get_record(variant, scope).await.unwrap().unwrap();
        assert_eq!(record.stock, 10);
        assert_eq!(store.movement_count().await, 3);
    }

    #[tokio::test]
    async fn remove_from_missing_record_reports_zero_available() {
        let store = InMemoryInventoryStore::new();
        let result = store
            .commit(
                UnitOfWork::new(UserId::new()).change(StockChange::remove(
                    VariantId::new(),
                    company_scope(),
                    1,
                    MovementType::Sale,
                )),
                CommitOptions::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { available: 0, .. })
        ));
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn bill_versions_guard_concurrent_transitions() {
        let store = InMemoryInventoryStore::new();
        let bill = exit_bill(VariantId::new(), 1);

        let receipt = store
            .commit(
                UnitOfWork::new(UserId::new()).bill(BillWrite::insert(bill.clone())),
                CommitOptions::default(),
            )
            .await
            .unwrap();
        let stored = receipt.bill(bill.id).unwrap().clone();
        assert_eq!(stored.version, Version::new(1));

        let mut first = stored.clone();
        first.status = BillStatus::Completed;
        store
            .commit(
                UnitOfWork::new(UserId::new()).bill(BillWrite::update(first)),
                CommitOptions::default(),
            )
            .await
            .unwrap();

        let mut second = stored;
        second.status = BillStatus::Cancelled;
        let result = store
            .commit(
                UnitOfWork::new(UserId::new()).bill(BillWrite::update(second)),
                CommitOptions::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));

        let current = store.get_bill(bill.id).await.unwrap().unwrap();
        assert_eq!(current.status, BillStatus::Completed);
        assert_eq!(current.version, Version::new(2));
    }

    #[tokio::test]
    async fn one_entry_bill_per_exit_bill() {
        let store = InMemoryInventoryStore::new();
        let exit = exit_bill(VariantId::new(), 1);

        let mut entry = exit.clone();
        entry.id = BillId::new();
        entry.bill_type = BillType::Entry;
        entry.related_bill_id = Some(exit.id);

        let mut second_entry = entry.clone();
        second_entry.id = BillId::new();

        store
            .commit(
                UnitOfWork::new(UserId::new())
                    .bill(BillWrite::insert(exit.clone()))
                    .bill(BillWrite::insert(entry.clone())),
                CommitOptions::default(),
            )
            .await
            .unwrap();

        let result = store
            .commit(
                UnitOfWork::new(UserId::new()).bill(BillWrite::insert(second_entry)),
                CommitOptions::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateEntryBill { exit_bill_id }) if exit_bill_id == exit.id
        ));
        assert_eq!(
            store.find_entry_bill(exit.id).await.unwrap().map(|b| b.id),
            Some(entry.id)
        );
    }

    #[tokio::test]
    async fn strict_release_rejects_over_release() {
        let store = InMemoryInventoryStore::new();
        let variant = VariantId::new();
        let scope = company_scope();
        seeded(&store, variant, scope).await;

        let unit =
            UnitOfWork::new(UserId::new()).change(StockChange::release(variant, scope, 1));

        let lenient = store
            .commit(unit.clone(), CommitOptions::new(ReleasePolicy::Lenient))
            .await
            .unwrap();
        assert!(lenient.movements.is_empty());

        let strict = store
            .commit(unit, CommitOptions::new(ReleasePolicy::Strict))
            .await;
        assert!(matches!(
            strict,
            Err(StoreError::ReleaseExceedsReserved { .. })
        ));
    }

    #[tokio::test]
    async fn movements_are_queryable_by_reference() {
        let store = InMemoryInventoryStore::new();
        let variant = VariantId::new();
        let scope = company_scope();
        seeded(&store, variant, scope).await;

        let bill = exit_bill(variant, 4);
        store
            .commit(
                UnitOfWork::new(UserId::new())
                    .change(
                        StockChange::reserve(variant, scope, 4)
                            .with_reference(Reference::bill(bill.id)),
                    )
                    .bill(BillWrite::insert(bill.clone())),
                CommitOptions::default(),
            )
            .await
            .unwrap();

        let movements = store
            .query_movements(MovementQuery::for_reference(Reference::bill(bill.id)))
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].counter, Counter::Reserved);
        assert_eq!(movements[0].previous_value, 0);
        assert_eq!(movements[0].new_value, 4);

        let history = store
            .query_movements(MovementQuery::for_record(variant, scope).limit(1))
            .await
            .unwrap();
        assert_eq!(history[0].movement_type, MovementType::Purchase);
    }

    #[tokio::test]
    async fn ensure_records_is_idempotent() {
        let store = InMemoryInventoryStore::new();
        let scope: OwnerScope = FranchiseId::new().into();
        let variants = vec![VariantId::new(), VariantId::new()];

        let created = store.ensure_records(scope, &variants).await.unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|r| r.stock == 0 && r.is_active));

        let again = store.ensure_records(scope, &variants).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(store.list_records(scope).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deactivated_record_rejects_changes() {
        let store = InMemoryInventoryStore::new();
        let variant = VariantId::new();
        let scope = company_scope();
        seeded(&store, variant, scope).await;

        let record = store
            .set_record_active(variant, scope, false)
            .await
            .unwrap();
        assert!(!record.is_active);

        let result = store
            .commit(
                UnitOfWork::new(UserId::new()).change(StockChange::add(
                    variant,
                    scope,
                    1,
                    MovementType::Purchase,
                )),
                CommitOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(StoreError::InactiveRecord { .. })));
    }
}
