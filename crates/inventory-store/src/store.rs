use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BillId, MovementId, OwnerScope, UserId, VariantId};

use crate::{
    BillQuery, Counter, InventoryMovement, InventoryRecord, MovementQuery, MovementType, Reference,
    ReleasePolicy, Result, StockOperation, StoreError, Version, WarehouseBill,
};

/// Key of an inventory record: one variant within one scope.
pub type RecordKey = (VariantId, OwnerScope);

/// One counter mutation inside a unit of work. Produces at most one movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub variant_id: VariantId,
    pub scope: OwnerScope,
    pub operation: StockOperation,
    pub quantity: i64,
    pub movement_type: MovementType,
    pub reference: Option<Reference>,
    pub note: Option<String>,
}

impl StockChange {
    pub fn new(
        variant_id: VariantId,
        scope: OwnerScope,
        operation: StockOperation,
        quantity: i64,
        movement_type: MovementType,
    ) -> Self {
        Self {
            variant_id,
            scope,
            operation,
            quantity,
            movement_type,
            reference: None,
            note: None,
        }
    }

    /// Inbound stock (purchase, inbound transfer, return, positive adjustment).
    pub fn add(
        variant_id: VariantId,
        scope: OwnerScope,
        quantity: i64,
        movement_type: MovementType,
    ) -> Self {
        Self::new(variant_id, scope, StockOperation::Add, quantity, movement_type)
    }

    /// Outbound stock (sale, outbound transfer, negative adjustment).
    pub fn remove(
        variant_id: VariantId,
        scope: OwnerScope,
        quantity: i64,
        movement_type: MovementType,
    ) -> Self {
        Self::new(variant_id, scope, StockOperation::Remove, quantity, movement_type)
    }

    pub fn reserve(variant_id: VariantId, scope: OwnerScope, quantity: i64) -> Self {
        Self::new(
            variant_id,
            scope,
            StockOperation::Reserve,
            quantity,
            MovementType::Reserve,
        )
    }

    pub fn release(variant_id: VariantId, scope: OwnerScope, quantity: i64) -> Self {
        Self::new(
            variant_id,
            scope,
            StockOperation::Release,
            quantity,
            MovementType::Release,
        )
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn key(&self) -> RecordKey {
        (self.variant_id, self.scope)
    }
}

/// A bill to insert or update, guarded by the version the writer last saw.
#[derive(Debug, Clone)]
pub struct BillWrite {
    pub bill: WarehouseBill,
    pub expected_version: Version,
}

impl BillWrite {
    /// Writes a bill that must not exist yet.
    pub fn insert(bill: WarehouseBill) -> Self {
        Self {
            bill,
            expected_version: Version::initial(),
        }
    }

    /// Writes a bill that must still be at the version it was loaded with.
    pub fn update(bill: WarehouseBill) -> Self {
        let expected_version = bill.version;
        Self {
            bill,
            expected_version,
        }
    }
}

/// Upper bound on the net stock change one reference may accumulate on one
/// record, summed over the committed movement log and the unit's own
/// movements.
///
/// The bound is checked while the record is locked, so two commits racing on
/// the same reference cannot both slip under it. A refund uses `max_net = 0`:
/// returns may bring the sale's net back to zero but never above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetStockLimit {
    pub reference: Reference,
    pub variant_id: VariantId,
    pub scope: OwnerScope,
    pub max_net: i64,
}

impl NetStockLimit {
    pub fn new(reference: Reference, variant_id: VariantId, scope: OwnerScope, max_net: i64) -> Self {
        Self {
            reference,
            variant_id,
            scope,
            max_net,
        }
    }

    pub fn key(&self) -> RecordKey {
        (self.variant_id, self.scope)
    }

    /// Whether a movement counts towards this limit.
    pub fn covers(&self, movement: &InventoryMovement) -> bool {
        movement.counter == Counter::Stock
            && movement.reference == Some(self.reference)
            && movement.variant_id == self.variant_id
            && movement.scope == self.scope
    }

    /// Fails when `committed` plus the unit's covered movements exceeds the bound.
    pub fn check(&self, committed: i64, pending: &[InventoryMovement]) -> Result<()> {
        let requested: i64 = pending
            .iter()
            .filter(|m| self.covers(m))
            .map(|m| m.quantity)
            .sum();
        match committed.checked_add(requested) {
            Some(net) if net <= self.max_net => Ok(()),
            _ => Err(StoreError::NetLimitExceeded {
                reference: self.reference,
                variant_id: self.variant_id,
                scope: self.scope,
                committed,
                requested,
                max_net: self.max_net,
            }),
        }
    }
}

/// Everything one operation wants to persist, applied all-or-nothing.
///
/// Stock changes are applied in order, so a release followed by a removal on
/// the same record sees the released reservation.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    pub actor: UserId,
    pub changes: Vec<StockChange>,
    pub bills: Vec<BillWrite>,
    pub limits: Vec<NetStockLimit>,
}

impl UnitOfWork {
    pub fn new(actor: UserId) -> Self {
        Self {
            actor,
            changes: Vec::new(),
            bills: Vec::new(),
            limits: Vec::new(),
        }
    }

    pub fn change(mut self, change: StockChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn changes(mut self, changes: impl IntoIterator<Item = StockChange>) -> Self {
        self.changes.extend(changes);
        self
    }

    pub fn bill(mut self, write: BillWrite) -> Self {
        self.bills.push(write);
        self
    }

    /// Adds a bound checked under the record lock. The limited record must
    /// also be touched by a change in this unit.
    pub fn limit(mut self, limit: NetStockLimit) -> Self {
        self.limits.push(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.bills.is_empty()
    }
}

/// Options applied to a whole commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    pub release_policy: ReleasePolicy,
}

impl CommitOptions {
    pub fn new(release_policy: ReleasePolicy) -> Self {
        Self { release_policy }
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    /// Movements in the order their changes were applied.
    pub movements: Vec<InventoryMovement>,
    /// Final state of every record a movement touched.
    pub records: Vec<InventoryRecord>,
    /// Stored bills, carrying their new versions.
    pub bills: Vec<WarehouseBill>,
}

impl CommitReceipt {
    pub fn record(&self, variant_id: VariantId, scope: OwnerScope) -> Option<&InventoryRecord> {
        self.records
            .iter()
            .find(|r| r.variant_id == variant_id && r.scope == scope)
    }

    pub fn bill(&self, bill_id: BillId) -> Option<&WarehouseBill> {
        self.bills.iter().find(|b| b.id == bill_id)
    }
}

/// Persistence for inventory records, movements and warehouse bills.
///
/// All implementations must be thread-safe. `commit` is the only way stock
/// counters change.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Applies a unit of work atomically.
    ///
    /// Every affected record is locked for the duration of the commit, each
    /// stock change is validated against the record's current counters and
    /// written together with exactly one movement. Any failure leaves the
    /// store unchanged.
    async fn commit(&self, unit: UnitOfWork, options: CommitOptions) -> Result<CommitReceipt>;

    async fn get_record(
        &self,
        variant_id: VariantId,
        scope: OwnerScope,
    ) -> Result<Option<InventoryRecord>>;

    /// Lists every record of a scope, active or not.
    async fn list_records(&self, scope: OwnerScope) -> Result<Vec<InventoryRecord>>;

    /// Creates zero-stock records for variants that have none in `scope`.
    ///
    /// Returns only the records created by this call.
    async fn ensure_records(
        &self,
        scope: OwnerScope,
        variants: &[VariantId],
    ) -> Result<Vec<InventoryRecord>>;

    async fn set_record_active(
        &self,
        variant_id: VariantId,
        scope: OwnerScope,
        active: bool,
    ) -> Result<InventoryRecord>;

    async fn get_bill(&self, bill_id: BillId) -> Result<Option<WarehouseBill>>;

    /// Finds the entry bill linked to an exit bill, if any.
    async fn find_entry_bill(&self, exit_bill_id: BillId) -> Result<Option<WarehouseBill>>;

    async fn query_bills(&self, query: BillQuery) -> Result<Vec<WarehouseBill>>;

    async fn query_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>>;

    /// Checks that the backing storage is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Rejects malformed units before any lock is taken.
pub fn validate_unit_of_work(unit: &UnitOfWork) -> Result<()> {
    if unit.is_empty() {
        return Err(StoreError::InvalidUnitOfWork(
            "nothing to commit".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for write in &unit.bills {
        if !seen.insert(write.bill.id) {
            return Err(StoreError::InvalidUnitOfWork(format!(
                "bill {} written twice",
                write.bill.id
            )));
        }
    }

    if let Some(change) = unit.changes.iter().find(|c| c.quantity < 0) {
        return Err(StoreError::InvalidQuantity {
            variant_id: change.variant_id,
            quantity: change.quantity,
        });
    }

    let locked: HashSet<RecordKey> = unit.changes.iter().map(StockChange::key).collect();
    if let Some(limit) = unit.limits.iter().find(|l| !locked.contains(&l.key())) {
        return Err(StoreError::InvalidUnitOfWork(format!(
            "limit on variant {} in {} has no matching change",
            limit.variant_id, limit.scope
        )));
    }

    Ok(())
}

/// A record loaded (or created) for the duration of one commit.
#[derive(Debug, Clone)]
pub(crate) struct WorkingRecord {
    pub record: InventoryRecord,
    /// Whether the record already exists in the backing store.
    pub persisted: bool,
    /// Whether a change was applied during this commit.
    pub dirty: bool,
}

impl WorkingRecord {
    pub fn existing(record: InventoryRecord) -> Self {
        Self {
            record,
            persisted: true,
            dirty: false,
        }
    }

    pub fn missing(key: RecordKey) -> Self {
        Self {
            record: InventoryRecord::new(key.0, key.1),
            persisted: false,
            dirty: false,
        }
    }
}

/// Distinct record keys of a unit in a stable order, so concurrent commits
/// always lock rows in the same sequence.
pub(crate) fn lock_order(changes: &[StockChange]) -> Vec<RecordKey> {
    let keys: BTreeMap<RecordKey, ()> = changes.iter().map(|c| (c.key(), ())).collect();
    keys.into_keys().collect()
}

/// Applies the unit's changes to the working set, producing one movement per
/// effective change. No-op changes produce nothing.
pub(crate) fn apply_changes(
    working: &mut BTreeMap<RecordKey, WorkingRecord>,
    changes: &[StockChange],
    policy: ReleasePolicy,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<InventoryMovement>> {
    let mut movements = Vec::with_capacity(changes.len());

    for change in changes {
        let entry = working
            .entry(change.key())
            .or_insert_with(|| WorkingRecord::missing(change.key()));

        let Some(counter_change) =
            entry
                .record
                .apply(change.operation, change.quantity, policy)?
        else {
            continue;
        };
        entry.dirty = true;

        movements.push(InventoryMovement {
            id: MovementId::new(),
            inventory_id: entry.record.id,
            variant_id: change.variant_id,
            scope: change.scope,
            movement_type: change.movement_type,
            counter: counter_change.counter,
            quantity: counter_change.delta(),
            previous_value: counter_change.previous,
            new_value: counter_change.new,
            reference: change.reference,
            note: change.note.clone(),
            created_by: actor,
            created_at: now,
        });
    }

    Ok(movements)
}

pub(crate) fn record_commit_metrics(movements: &[InventoryMovement], started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    metrics::histogram!("store_commit_duration_seconds").record(elapsed);
    tracing::debug!(movements = movements.len(), elapsed, "unit of work committed");
    for movement in movements {
        metrics::counter!("inventory_movements_total", "type" => movement.movement_type.as_str())
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CompanyId, SaleId};

    #[test]
    fn empty_unit_is_rejected() {
        let unit = UnitOfWork::new(UserId::new());
        assert!(matches!(
            validate_unit_of_work(&unit),
            Err(StoreError::InvalidUnitOfWork(_))
        ));
    }

    #[test]
    fn negative_change_is_rejected() {
        let scope: OwnerScope = CompanyId::new().into();
        let unit = UnitOfWork::new(UserId::new()).change(StockChange::add(
            VariantId::new(),
            scope,
            -3,
            MovementType::Purchase,
        ));
        assert!(matches!(
            validate_unit_of_work(&unit),
            Err(StoreError::InvalidQuantity { quantity: -3, .. })
        ));
    }

    #[test]
    fn changes_apply_in_order_on_shared_record() {
        let scope: OwnerScope = CompanyId::new().into();
        let variant = VariantId::new();
        let mut working = BTreeMap::new();

        let changes = vec![
            StockChange::add(variant, scope, 10, MovementType::Purchase),
            StockChange::reserve(variant, scope, 10),
            StockChange::release(variant, scope, 10),
            StockChange::remove(variant, scope, 10, MovementType::Transfer),
        ];
        let movements = apply_changes(
            &mut working,
            &changes,
            ReleasePolicy::Strict,
            UserId::new(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(movements.len(), 4);
        assert_eq!(movements[2].movement_type, MovementType::Release);
        assert_eq!(movements[2].counter, Counter::Reserved);
        assert_eq!(movements[2].quantity, -10);
        assert_eq!(movements[3].movement_type, MovementType::Transfer);
        assert_eq!(movements[3].quantity, -10);

        let record = &working[&(variant, scope)].record;
        assert_eq!((record.stock, record.reserved_stock), (0, 0));
    }

    #[test]
    fn lenient_release_on_missing_record_writes_nothing() {
        let scope: OwnerScope = CompanyId::new().into();
        let variant = VariantId::new();
        let mut working = BTreeMap::new();

        let movements = apply_changes(
            &mut working,
            &[StockChange::release(variant, scope, 4)],
            ReleasePolicy::Lenient,
            UserId::new(),
            Utc::now(),
        )
        .unwrap();

        assert!(movements.is_empty());
        assert!(!working[&(variant, scope)].dirty);
    }

    #[test]
    fn limit_without_matching_change_is_rejected() {
        let scope: OwnerScope = CompanyId::new().into();
        let unit = UnitOfWork::new(UserId::new())
            .change(StockChange::add(
                VariantId::new(),
                scope,
                1,
                MovementType::Return,
            ))
            .limit(NetStockLimit::new(
                Reference::sale(SaleId::new()),
                VariantId::new(),
                scope,
                0,
            ));
        assert!(matches!(
            validate_unit_of_work(&unit),
            Err(StoreError::InvalidUnitOfWork(_))
        ));
    }

    #[test]
    fn net_limit_counts_only_covered_stock_movements() {
        let scope: OwnerScope = CompanyId::new().into();
        let variant = VariantId::new();
        let sale = Reference::sale(SaleId::new());
        let mut working = BTreeMap::new();

        let movements = apply_changes(
            &mut working,
            &[
                StockChange::add(variant, scope, 5, MovementType::Purchase),
                StockChange::add(variant, scope, 2, MovementType::Return).with_reference(sale),
                StockChange::reserve(variant, scope, 3).with_reference(sale),
            ],
            ReleasePolicy::Strict,
            UserId::new(),
            Utc::now(),
        )
        .unwrap();

        let limit = NetStockLimit::new(sale, variant, scope, 0);
        // Sold 3 earlier, returning 2 now
        assert!(limit.check(-3, &movements).is_ok());
        assert!(limit.check(-2, &movements).is_ok());

        let err = limit.check(-1, &movements).unwrap_err();
        assert!(matches!(
            err,
            StoreError::NetLimitExceeded {
                committed: -1,
                requested: 2,
                max_net: 0,
                ..
            }
        ));
        assert!(err.is_capacity());
    }

    #[test]
    fn lock_order_is_sorted_and_distinct() {
        let scope: OwnerScope = CompanyId::new().into();
        let a = VariantId::new();
        let b = VariantId::new();
        let changes = vec![
            StockChange::reserve(b, scope, 1),
            StockChange::reserve(a, scope, 1),
            StockChange::reserve(b, scope, 1),
        ];
        let order = lock_order(&changes);
        assert_eq!(order.len(), 2);
        assert!(order[0] < order[1]);
    }
}
