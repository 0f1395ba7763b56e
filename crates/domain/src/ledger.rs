//! The inventory ledger: the single component that changes stock counters.

use std::collections::HashMap;
use std::sync::Arc;

use common::{ActorContext, FranchiseId, OwnerScope, Role, UserId, VariantId};
use inventory_store::{
    CommitOptions, CommitReceipt, Counter, InventoryMovement, InventoryRecord, InventoryStore,
    MovementQuery, MovementType, Reference, StockChange, StoreError, UnitOfWork,
};

use crate::access;
use crate::error::{LedgerError, Result};
use crate::{LedgerConfig, TenancyDirectory};

/// Document link and free-text note carried onto a movement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub reference: Option<Reference>,
    pub note: Option<String>,
}

impl Annotation {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn reference(reference: Reference) -> Self {
        Self {
            reference: Some(reference),
            note: None,
        }
    }

    pub fn note(note: impl Into<String>) -> Self {
        Self {
            reference: None,
            note: Some(note.into()),
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    fn apply_to(self, change: StockChange) -> StockChange {
        let change = match self.reference {
            Some(reference) => change.with_reference(reference),
            None => change,
        };
        change.with_note(self.note)
    }
}

/// Stock counters per (variant, scope), changed only through paired movements.
///
/// Single-record operations return the written movement, or `None` when the
/// operation was a no-op (zero amount, or a lenient over-release).
pub struct InventoryLedger<S: InventoryStore> {
    store: S,
    tenancy: Arc<dyn TenancyDirectory>,
    config: LedgerConfig,
}

impl<S: InventoryStore> InventoryLedger<S> {
    pub fn new(store: S, tenancy: Arc<dyn TenancyDirectory>, config: LedgerConfig) -> Self {
        Self {
            store,
            tenancy,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tenancy(&self) -> &Arc<dyn TenancyDirectory> {
        &self.tenancy
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Applies a multi-change unit of work under the configured release policy.
    pub async fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt> {
        self.store
            .commit(unit, CommitOptions::new(self.config.release_policy))
            .await
            .map_err(|e| {
                if e.is_capacity() {
                    tracing::warn!(error = %e, "stock change rejected");
                }
                LedgerError::Store(e)
            })
    }

    /// Checks the caller's role and scope, resolving a franchise's owning
    /// company when a company-scoped actor targets it.
    pub async fn authorize(
        &self,
        actor: &ActorContext,
        min_role: Role,
        target: OwnerScope,
    ) -> Result<()> {
        let parent = match (actor.scope, target) {
            (OwnerScope::Company(_), OwnerScope::Franchise(franchise_id)) => {
                self.tenancy.company_of(franchise_id).await?
            }
            _ => None,
        };
        access::require(actor, min_role, target, parent)?;
        Ok(())
    }

    async fn apply_single(
        &self,
        actor: UserId,
        change: StockChange,
    ) -> Result<Option<InventoryMovement>> {
        if change.quantity == 0 {
            return Ok(None);
        }
        let receipt = self.commit(UnitOfWork::new(actor).change(change)).await?;
        Ok(receipt.movements.into_iter().next())
    }

    /// Increments on-hand stock.
    #[tracing::instrument(skip(self, annotation))]
    pub async fn add_stock(
        &self,
        actor: UserId,
        variant_id: VariantId,
        scope: OwnerScope,
        amount: i64,
        movement_type: MovementType,
        annotation: Annotation,
    ) -> Result<Option<InventoryMovement>> {
        let change = StockChange::add(variant_id, scope, amount, movement_type);
        self.apply_single(actor, annotation.apply_to(change)).await
    }

    /// Decrements on-hand stock, bounded by available stock.
    #[tracing::instrument(skip(self, annotation))]
    pub async fn remove_stock(
        &self,
        actor: UserId,
        variant_id: VariantId,
        scope: OwnerScope,
        amount: i64,
        movement_type: MovementType,
        annotation: Annotation,
    ) -> Result<Option<InventoryMovement>> {
        let change = StockChange::remove(variant_id, scope, amount, movement_type);
        self.apply_single(actor, annotation.apply_to(change)).await
    }

    /// Holds available stock without moving it.
    #[tracing::instrument(skip(self, annotation))]
    pub async fn reserve_stock(
        &self,
        actor: UserId,
        variant_id: VariantId,
        scope: OwnerScope,
        amount: i64,
        annotation: Annotation,
    ) -> Result<Option<InventoryMovement>> {
        let change = StockChange::reserve(variant_id, scope, amount);
        self.apply_single(actor, annotation.apply_to(change)).await
    }

    /// Drops a hold. Asking for more than is reserved follows the release policy.
    #[tracing::instrument(skip(self, annotation))]
    pub async fn release_stock(
        &self,
        actor: UserId,
        variant_id: VariantId,
        scope: OwnerScope,
        amount: i64,
        annotation: Annotation,
    ) -> Result<Option<InventoryMovement>> {
        let change = StockChange::release(variant_id, scope, amount);
        self.apply_single(actor, annotation.apply_to(change)).await
    }

    /// `stock - reserved_stock`, or zero when no record exists.
    pub async fn get_available_stock(&self, variant_id: VariantId, scope: OwnerScope) -> Result<i64> {
        Ok(self
            .store
            .get_record(variant_id, scope)
            .await?
            .map(|record| record.available())
            .unwrap_or(0))
    }

    /// Signed manual correction recorded as an `adjustment` movement.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn adjust_stock(
        &self,
        actor: &ActorContext,
        variant_id: VariantId,
        scope: OwnerScope,
        delta: i64,
        reason: Option<String>,
    ) -> Result<Option<InventoryMovement>> {
        self.authorize(actor, Role::Admin, scope).await?;

        let change = if delta >= 0 {
            StockChange::add(variant_id, scope, delta, MovementType::Adjustment)
        } else {
            let amount = delta.checked_neg().ok_or(StoreError::InvalidQuantity {
                variant_id,
                quantity: delta,
            })?;
            StockChange::remove(variant_id, scope, amount, MovementType::Adjustment)
        };
        let movement = self
            .apply_single(actor.user_id, change.with_note(reason))
            .await?;

        if movement.is_some() {
            tracing::info!(delta, "stock adjusted");
        }
        Ok(movement)
    }

    /// Creates zero-stock records for a franchise, one per catalog variant.
    ///
    /// Returns only the records that did not exist yet.
    #[tracing::instrument(skip(self, actor, variants), fields(variants = variants.len()))]
    pub async fn initialize_franchise(
        &self,
        actor: &ActorContext,
        franchise_id: FranchiseId,
        variants: &[VariantId],
    ) -> Result<Vec<InventoryRecord>> {
        if self.tenancy.company_of(franchise_id).await?.is_none() {
            return Err(LedgerError::UnknownFranchise(franchise_id));
        }
        let scope = OwnerScope::Franchise(franchise_id);
        self.authorize(actor, Role::Admin, scope).await?;

        let created = self.store.ensure_records(scope, variants).await?;
        tracing::info!(created = created.len(), "franchise inventory initialized");
        Ok(created)
    }

    /// Deactivates a record. Records are never deleted.
    #[tracing::instrument(skip(self, actor))]
    pub async fn deactivate(
        &self,
        actor: &ActorContext,
        variant_id: VariantId,
        scope: OwnerScope,
    ) -> Result<InventoryRecord> {
        self.authorize(actor, Role::Admin, scope).await?;
        Ok(self.store.set_record_active(variant_id, scope, false).await?)
    }

    #[tracing::instrument(skip(self, actor))]
    pub async fn reactivate(
        &self,
        actor: &ActorContext,
        variant_id: VariantId,
        scope: OwnerScope,
    ) -> Result<InventoryRecord> {
        self.authorize(actor, Role::Admin, scope).await?;
        Ok(self.store.set_record_active(variant_id, scope, true).await?)
    }

    pub async fn get_record(
        &self,
        variant_id: VariantId,
        scope: OwnerScope,
    ) -> Result<Option<InventoryRecord>> {
        Ok(self.store.get_record(variant_id, scope).await?)
    }

    pub async fn movement_history(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>> {
        Ok(self.store.query_movements(query).await?)
    }

    pub async fn stock_levels(&self, scope: OwnerScope) -> Result<Vec<InventoryRecord>> {
        Ok(self.store.list_records(scope).await?)
    }

    /// Reserved units still held for `reference` in `scope`, per variant.
    ///
    /// Derived from the movement log: reserves minus releases.
    pub async fn outstanding_reservations(
        &self,
        scope: OwnerScope,
        reference: Reference,
    ) -> Result<HashMap<VariantId, i64>> {
        let movements = self
            .store
            .query_movements(MovementQuery::for_reference(reference).scope(scope))
            .await?;

        let mut outstanding: HashMap<VariantId, i64> = HashMap::new();
        for movement in movements
            .iter()
            .filter(|m| m.counter == Counter::Reserved)
        {
            *outstanding.entry(movement.variant_id).or_default() += movement.quantity;
        }
        outstanding.retain(|_, held| *held > 0);
        Ok(outstanding)
    }

    pub async fn outstanding_reservation(
        &self,
        scope: OwnerScope,
        variant_id: VariantId,
        reference: Reference,
    ) -> Result<i64> {
        Ok(self
            .outstanding_reservations(scope, reference)
            .await?
            .get(&variant_id)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessDenied, InMemoryTenancyDirectory};
    use common::{BillId, CompanyId};
    use inventory_store::{InMemoryInventoryStore, ReleasePolicy};

    struct Fixture {
        ledger: InventoryLedger<InMemoryInventoryStore>,
        company: CompanyId,
        franchise: FranchiseId,
        user: UserId,
    }

    fn fixture(config: LedgerConfig) -> Fixture {
        let tenancy = InMemoryTenancyDirectory::new();
        let company = CompanyId::new();
        let franchise = FranchiseId::new();
        tenancy.register(company, franchise);

        Fixture {
            ledger: InventoryLedger::new(InMemoryInventoryStore::new(), Arc::new(tenancy), config),
            company,
            franchise,
            user: UserId::new(),
        }
    }

    #[tokio::test]
    async fn add_then_remove_tracks_available() {
        let f = fixture(LedgerConfig::default());
        let scope: OwnerScope = f.company.into();
        let v = VariantId::new();

        let added = f
            .ledger
            .add_stock(f.user, v, scope, 10, MovementType::Purchase, Annotation::none())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(added.quantity, 10);

        f.ledger
            .reserve_stock(f.user, v, scope, 4, Annotation::none())
            .await
            .unwrap();
        assert_eq!(f.ledger.get_available_stock(v, scope).await.unwrap(), 6);

        let err = f
            .ledger
            .remove_stock(f.user, v, scope, 7, MovementType::Sale, Annotation::none())
            .await
            .unwrap_err();
        assert!(err.is_capacity());

        let removed = f
            .ledger
            .remove_stock(f.user, v, scope, 6, MovementType::Sale, Annotation::none())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(removed.quantity, -6);
        assert_eq!(f.ledger.get_available_stock(v, scope).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_amounts_write_nothing() {
        let f = fixture(LedgerConfig::default());
        let scope: OwnerScope = f.company.into();
        let v = VariantId::new();

        assert!(
            f.ledger
                .add_stock(f.user, v, scope, 0, MovementType::Purchase, Annotation::none())
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            f.ledger
                .release_stock(f.user, v, scope, 0, Annotation::none())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(f.ledger.store().movement_count().await, 0);
    }

    #[tokio::test]
    async fn over_release_is_noop_unless_strict() {
        let lenient = fixture(LedgerConfig::default());
        let scope: OwnerScope = lenient.company.into();
        let v = VariantId::new();
        lenient
            .ledger
            .add_stock(lenient.user, v, scope, 5, MovementType::Purchase, Annotation::none())
            .await
            .unwrap();
        assert!(
            lenient
                .ledger
                .release_stock(lenient.user, v, scope, 3, Annotation::none())
                .await
                .unwrap()
                .is_none()
        );

        let strict = fixture(LedgerConfig::default().with_release_policy(ReleasePolicy::Strict));
        let scope: OwnerScope = strict.company.into();
        strict
            .ledger
            .add_stock(strict.user, v, scope, 5, MovementType::Purchase, Annotation::none())
            .await
            .unwrap();
        let err = strict
            .ledger
            .release_stock(strict.user, v, scope, 3, Annotation::none())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Store(StoreError::ReleaseExceedsReserved { .. })
        ));
    }

    #[tokio::test]
    async fn adjustment_requires_admin_and_carries_reason() {
        let f = fixture(LedgerConfig::default());
        let scope: OwnerScope = f.company.into();
        let v = VariantId::new();

        let manager = ActorContext::new(f.user, Role::Manager, scope);
        let err = f
            .ledger
            .adjust_stock(&manager, v, scope, 3, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Forbidden(AccessDenied::InsufficientRole { .. })
        ));

        let admin = ActorContext::new(f.user, Role::Admin, scope);
        let up = f
            .ledger
            .adjust_stock(&admin, v, scope, 3, Some("cycle count".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(up.movement_type, MovementType::Adjustment);
        assert_eq!(up.quantity, 3);
        assert_eq!(up.note.as_deref(), Some("cycle count"));

        let down = f
            .ledger
            .adjust_stock(&admin, v, scope, -2, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(down.quantity, -2);

        assert!(
            f.ledger
                .adjust_stock(&admin, v, scope, -5, None)
                .await
                .unwrap_err()
                .is_capacity()
        );
    }

    #[tokio::test]
    async fn counters_reject_out_of_range_amounts() {
        let f = fixture(LedgerConfig::default());
        let scope: OwnerScope = f.company.into();
        let v = VariantId::new();

        f.ledger
            .add_stock(f.user, v, scope, i64::MAX, MovementType::Purchase, Annotation::none())
            .await
            .unwrap();
        let err = f
            .ledger
            .add_stock(f.user, v, scope, 1, MovementType::Purchase, Annotation::none())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Store(StoreError::CounterOverflow { quantity: 1, .. })
        ));

        let admin = ActorContext::new(f.user, Role::Admin, scope);
        let err = f
            .ledger
            .adjust_stock(&admin, v, scope, i64::MIN, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Store(StoreError::InvalidQuantity {
                quantity: i64::MIN,
                ..
            })
        ));

        let record = f.ledger.get_record(v, scope).await.unwrap().unwrap();
        assert_eq!(record.stock, i64::MAX);
        assert_eq!(record.reserved_stock, 0);
    }

    #[tokio::test]
    async fn company_admin_initializes_its_franchise() {
        let f = fixture(LedgerConfig::default());
        let admin = ActorContext::new(f.user, Role::Admin, f.company.into());
        let variants = [VariantId::new(), VariantId::new(), VariantId::new()];

        let created = f
            .ledger
            .initialize_franchise(&admin, f.franchise, &variants)
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert!(created.iter().all(|r| r.stock == 0 && r.reserved_stock == 0));

        let levels = f.ledger.stock_levels(f.franchise.into()).await.unwrap();
        assert_eq!(levels.len(), 3);

        let other_admin = ActorContext::new(f.user, Role::Admin, CompanyId::new().into());
        assert!(matches!(
            f.ledger
                .initialize_franchise(&other_admin, f.franchise, &variants)
                .await,
            Err(LedgerError::Forbidden(AccessDenied::OutOfScope { .. }))
        ));

        assert!(matches!(
            f.ledger
                .initialize_franchise(&admin, FranchiseId::new(), &variants)
                .await,
            Err(LedgerError::UnknownFranchise(_))
        ));
    }

    #[tokio::test]
    async fn deactivated_records_reject_movements() {
        let f = fixture(LedgerConfig::default());
        let scope: OwnerScope = f.company.into();
        let admin = ActorContext::new(f.user, Role::Admin, scope);
        let v = VariantId::new();
        f.ledger
            .add_stock(f.user, v, scope, 1, MovementType::Purchase, Annotation::none())
            .await
            .unwrap();

        f.ledger.deactivate(&admin, v, scope).await.unwrap();
        assert!(
            f.ledger
                .add_stock(f.user, v, scope, 1, MovementType::Purchase, Annotation::none())
                .await
                .is_err()
        );

        let record = f.ledger.reactivate(&admin, v, scope).await.unwrap();
        assert!(record.is_active);
    }

    #[tokio::test]
    async fn outstanding_reservation_follows_reference() {
        let f = fixture(LedgerConfig::default());
        let scope: OwnerScope = f.company.into();
        let v = VariantId::new();
        let bill_a = Reference::bill(BillId::new());
        let bill_b = Reference::bill(BillId::new());

        f.ledger
            .add_stock(f.user, v, scope, 20, MovementType::Purchase, Annotation::none())
            .await
            .unwrap();
        f.ledger
            .reserve_stock(f.user, v, scope, 8, Annotation::reference(bill_a))
            .await
            .unwrap();
        f.ledger
            .reserve_stock(f.user, v, scope, 5, Annotation::reference(bill_b))
            .await
            .unwrap();
        f.ledger
            .release_stock(f.user, v, scope, 3, Annotation::reference(bill_a))
            .await
            .unwrap();

        assert_eq!(f.ledger.outstanding_reservation(scope, v, bill_a).await.unwrap(), 5);
        assert_eq!(f.ledger.outstanding_reservation(scope, v, bill_b).await.unwrap(), 5);

        let history = f
            .ledger
            .movement_history(MovementQuery::for_record(v, scope))
            .await
            .unwrap();
        assert_eq!(history.len(), 4);
    }
}
