//! Transfer orchestrator driving the exit-bill / entry-bill protocol.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use common::{ActorContext, BillId, BillItemId, Money, OwnerScope, Role, VariantId};
use domain::{InventoryLedger, reconcile_entry_items};
use inventory_store::{
    BillQuery, BillStatus, BillType, BillWrite, InventoryStore, MovementType, Reference,
    StockChange, UnitOfWork, WarehouseBill, WarehouseBillItem,
};

use crate::commands::{
    CancelWarehouseBill, CompleteEntryBill, CompleteExitBill, CreateEntryBill, CreateExitBill,
    UpdateExitBillItems, VerifyEntryBill,
};
use crate::error::{IssueKind, Result, TransferError, ValidationReport};
use crate::report::DiscrepancyReport;
use crate::services::CatalogService;

/// Moves stock from a company warehouse to a franchise.
///
/// The transfer runs as a sequence of independent transactions:
///
/// ```text
/// create exit (reserve) ─► complete exit (release + transfer out)
///        │                          │
///        └─► cancel (release)       └─► create entry ─► verify ─► complete entry
///                                                                  (credit franchise)
/// ```
///
/// Every step commits its bill transition together with all of its stock
/// changes, so a failing line leaves neither movements nor a status change
/// behind. Cancellation of a draft is the only compensation; there are no
/// timeouts or automatic retries.
pub struct TransferOrchestrator<S, C>
where
    S: InventoryStore,
    C: CatalogService,
{
    ledger: Arc<InventoryLedger<S>>,
    catalog: C,
}

impl<S, C> TransferOrchestrator<S, C>
where
    S: InventoryStore,
    C: CatalogService,
{
    /// Creates a new transfer orchestrator.
    pub fn new(ledger: Arc<InventoryLedger<S>>, catalog: C) -> Self {
        Self { ledger, catalog }
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Opens a draft exit bill and reserves every line against company stock.
    ///
    /// All failing lines are reported together. Stock is checked once here
    /// and again by the reservation itself, which catches a concurrent
    /// reservation made in between.
    #[tracing::instrument(
        skip(self, actor, cmd),
        fields(company_id = %cmd.company_id, franchise_id = %cmd.franchise_id, lines = cmd.items.len())
    )]
    pub async fn create_exit_bill(
        &self,
        actor: &ActorContext,
        cmd: CreateExitBill,
    ) -> Result<WarehouseBill> {
        let company_scope = OwnerScope::Company(cmd.company_id);
        self.ledger
            .authorize(actor, Role::Manager, company_scope)
            .await?;

        if !self
            .ledger
            .tenancy()
            .belongs_to(cmd.franchise_id, cmd.company_id)
            .await?
        {
            return Err(TransferError::FranchiseNotInCompany {
                franchise_id: cmd.franchise_id,
                company_id: cmd.company_id,
            });
        }

        let variant_ids: Vec<VariantId> = cmd.items.iter().map(|l| l.variant_id).collect();
        let catalog = self.catalog.lookup_many(&variant_ids).await?;

        let mut report = ValidationReport::new();
        if cmd.items.is_empty() {
            report.push(0, None, IssueKind::NoItems);
        }
        let mut seen = HashSet::new();
        for (line, item) in cmd.items.iter().enumerate() {
            let variant = Some(item.variant_id);
            if item.quantity == 0 {
                report.push(line, variant, IssueKind::ZeroQuantity);
                continue;
            }
            if !seen.insert(item.variant_id) {
                report.push(line, variant, IssueKind::DuplicateVariant);
                continue;
            }
            if !catalog.contains_key(&item.variant_id) {
                report.push(line, variant, IssueKind::UnknownVariant);
                continue;
            }

            let requested = i64::from(item.quantity);
            let available = self
                .ledger
                .get_available_stock(item.variant_id, company_scope)
                .await?;
            if available < requested {
                report.push(
                    line,
                    variant,
                    IssueKind::InsufficientStock {
                        requested,
                        available,
                    },
                );
            }
        }
        Self::reject(report)?;

        let items = cmd
            .items
            .iter()
            .map(|line| {
                let price = line
                    .unit_price
                    .or_else(|| catalog.get(&line.variant_id).map(|e| e.retail_price))
                    .unwrap_or_default();
                WarehouseBillItem::new(line.variant_id, line.quantity, price)
            })
            .collect();

        let mut bill = WarehouseBill::draft(
            BillType::Exit,
            cmd.company_id,
            cmd.franchise_id,
            items,
            actor.user_id,
        );
        bill.notes = cmd.notes;
        let reference = Reference::bill(bill.id);

        let unit = UnitOfWork::new(actor.user_id)
            .changes(bill.items.iter().map(|item| {
                StockChange::reserve(item.variant_id, company_scope, i64::from(item.quantity))
                    .with_reference(reference)
            }))
            .bill(BillWrite::insert(bill.clone()));
        let bill = self.commit_bill(unit, bill.id).await?;

        Self::record_transition(BillType::Exit, "created");
        tracing::info!(bill_id = %bill.id, total = %bill.total_amount, "exit bill created");
        Ok(bill)
    }

    /// Replaces the items of a draft exit bill, adjusting reservations by
    /// the per-line delta.
    ///
    /// Releases are applied before reservations so a line can move stock
    /// between variants within one update.
    #[tracing::instrument(skip(self, actor, cmd), fields(bill_id = %cmd.bill_id, lines = cmd.items.len()))]
    pub async fn update_exit_bill_items(
        &self,
        actor: &ActorContext,
        cmd: UpdateExitBillItems,
    ) -> Result<WarehouseBill> {
        let mut bill = self.load_bill(cmd.bill_id).await?;
        Self::expect_type(&bill, BillType::Exit)?;
        let company_scope = OwnerScope::Company(bill.company_id);
        self.ledger
            .authorize(actor, Role::Manager, company_scope)
            .await?;
        if !bill.status.can_modify_items() {
            return Err(Self::transition_denied(&bill, "update"));
        }

        let variant_ids: Vec<VariantId> = cmd.items.iter().map(|l| l.variant_id).collect();
        let catalog = self.catalog.lookup_many(&variant_ids).await?;

        let mut report = ValidationReport::new();
        if cmd.items.is_empty() {
            report.push(0, None, IssueKind::NoItems);
        }
        let mut seen_variants = HashSet::new();
        let mut seen_items: HashSet<BillItemId> = HashSet::new();
        for (line, update) in cmd.items.iter().enumerate() {
            let variant = Some(update.variant_id);
            if update.quantity == 0 {
                report.push(line, variant, IssueKind::ZeroQuantity);
            }
            if !seen_variants.insert(update.variant_id) {
                report.push(line, variant, IssueKind::DuplicateVariant);
            }
            if let Some(item_id) = update.item_id {
                if bill.item(item_id).is_none() {
                    report.push(line, variant, IssueKind::UnknownLine { item_id });
                } else if !seen_items.insert(item_id) {
                    report.push(line, variant, IssueKind::DuplicateLine { item_id });
                }
            }
            if !catalog.contains_key(&update.variant_id) {
                report.push(line, variant, IssueKind::UnknownVariant);
            }
        }
        Self::reject(report)?;

        // Per-line deltas
        let mut releases: Vec<(VariantId, i64)> = Vec::new();
        let mut reserves: Vec<(usize, VariantId, i64)> = Vec::new();
        for item in &bill.items {
            if !seen_items.contains(&item.id) {
                releases.push((item.variant_id, i64::from(item.quantity)));
            }
        }
        for (line, update) in cmd.items.iter().enumerate() {
            let new_qty = i64::from(update.quantity);
            match update.item_id.and_then(|id| bill.item(id)) {
                Some(existing) if existing.variant_id == update.variant_id => {
                    let old_qty = i64::from(existing.quantity);
                    if new_qty > old_qty {
                        reserves.push((line, update.variant_id, new_qty - old_qty));
                    } else if new_qty < old_qty {
                        releases.push((update.variant_id, old_qty - new_qty));
                    }
                }
                Some(existing) => {
                    releases.push((existing.variant_id, i64::from(existing.quantity)));
                    reserves.push((line, update.variant_id, new_qty));
                }
                None => reserves.push((line, update.variant_id, new_qty)),
            }
        }

        // Net extra demand per variant must fit in available stock
        let mut demand: HashMap<VariantId, (usize, i64)> = HashMap::new();
        for &(line, variant_id, qty) in &reserves {
            demand.entry(variant_id).or_insert((line, 0)).1 += qty;
        }
        for &(variant_id, qty) in &releases {
            if let Some(entry) = demand.get_mut(&variant_id) {
                entry.1 -= qty;
            }
        }
        let mut demand: Vec<(VariantId, usize, i64)> = demand
            .into_iter()
            .filter(|(_, (_, need))| *need > 0)
            .map(|(variant_id, (line, need))| (variant_id, line, need))
            .collect();
        demand.sort_by_key(|&(_, line, _)| line);

        let mut report = ValidationReport::new();
        for (variant_id, line, need) in demand {
            let available = self
                .ledger
                .get_available_stock(variant_id, company_scope)
                .await?;
            if available < need {
                report.push(
                    line,
                    Some(variant_id),
                    IssueKind::InsufficientStock {
                        requested: need,
                        available,
                    },
                );
            }
        }
        Self::reject(report)?;

        let items: Vec<WarehouseBillItem> = cmd
            .items
            .iter()
            .map(|update| {
                let existing = update.item_id.and_then(|id| bill.item(id));
                let price = update
                    .unit_price
                    .or_else(|| {
                        existing
                            .filter(|e| e.variant_id == update.variant_id)
                            .map(|e| e.unit_price)
                    })
                    .or_else(|| catalog.get(&update.variant_id).map(|e| e.retail_price))
                    .unwrap_or_default();
                let mut item = WarehouseBillItem::new(update.variant_id, update.quantity, price);
                if let Some(existing) = existing {
                    item.id = existing.id;
                }
                item
            })
            .collect();
        bill.items = items;
        bill.recalculate_total();

        let reference = Reference::bill(bill.id);
        let reason = cmd.reason;
        let changes = releases
            .into_iter()
            .map(|(variant_id, qty)| StockChange::release(variant_id, company_scope, qty))
            .chain(
                reserves
                    .into_iter()
                    .map(|(_, variant_id, qty)| StockChange::reserve(variant_id, company_scope, qty)),
            )
            .map(|change| change.with_reference(reference).with_note(reason.clone()))
            .collect::<Vec<_>>();
        let movements = changes.len();

        let unit = UnitOfWork::new(actor.user_id)
            .changes(changes)
            .bill(BillWrite::update(bill.clone()));
        let bill = self.commit_bill(unit, bill.id).await?;

        Self::record_transition(BillType::Exit, "updated");
        tracing::info!(bill_id = %bill.id, movements, "exit bill items updated");
        Ok(bill)
    }

    /// Ships a draft exit bill: each line's reservation is released and the
    /// same quantity leaves company stock as a transfer.
    #[tracing::instrument(skip(self, actor), fields(bill_id = %cmd.bill_id))]
    pub async fn complete_exit_bill(
        &self,
        actor: &ActorContext,
        cmd: CompleteExitBill,
    ) -> Result<WarehouseBill> {
        let bill = self.load_bill(cmd.bill_id).await?;
        Self::expect_type(&bill, BillType::Exit)?;
        let company_scope = OwnerScope::Company(bill.company_id);
        self.ledger
            .authorize(actor, Role::Manager, company_scope)
            .await?;
        if !bill.status.can_complete(BillType::Exit) {
            return Err(Self::transition_denied(&bill, "complete"));
        }

        let reference = Reference::bill(bill.id);
        let note = Some(format!("transfer to franchise {}", bill.franchise_id));
        let mut changes = Vec::with_capacity(bill.items.len() * 2);
        for item in &bill.items {
            let qty = i64::from(item.quantity);
            changes.push(
                StockChange::release(item.variant_id, company_scope, qty).with_reference(reference),
            );
            changes.push(
                StockChange::remove(item.variant_id, company_scope, qty, MovementType::Transfer)
                    .with_reference(reference)
                    .with_note(note.clone()),
            );
        }

        let mut completed = bill;
        completed.status = BillStatus::Completed;
        let unit = UnitOfWork::new(actor.user_id)
            .changes(changes)
            .bill(BillWrite::update(completed.clone()));
        let bill = self.commit_bill(unit, completed.id).await?;

        Self::record_transition(BillType::Exit, "completed");
        tracing::info!(bill_id = %bill.id, units = bill.total_quantity(), "exit bill completed");
        Ok(bill)
    }

    /// Cancels a draft bill. Exit bills release whatever is still reserved
    /// for them; entry bills only change status.
    #[tracing::instrument(skip(self, actor, cmd), fields(bill_id = %cmd.bill_id))]
    pub async fn cancel_warehouse_bill(
        &self,
        actor: &ActorContext,
        cmd: CancelWarehouseBill,
    ) -> Result<WarehouseBill> {
        let bill = self.load_bill(cmd.bill_id).await?;
        let required_scope = match bill.bill_type {
            BillType::Exit => OwnerScope::Company(bill.company_id),
            BillType::Entry => OwnerScope::Franchise(bill.franchise_id),
        };
        self.ledger
            .authorize(actor, Role::Manager, required_scope)
            .await?;
        if !bill.status.can_cancel() {
            return Err(Self::transition_denied(&bill, "cancel"));
        }

        let mut unit = UnitOfWork::new(actor.user_id);
        if bill.bill_type == BillType::Exit {
            let company_scope = OwnerScope::Company(bill.company_id);
            let reference = Reference::bill(bill.id);
            let outstanding = self
                .ledger
                .outstanding_reservations(company_scope, reference)
                .await?;
            for item in &bill.items {
                if let Some(&held) = outstanding.get(&item.variant_id) {
                    unit = unit.change(
                        StockChange::release(item.variant_id, company_scope, held)
                            .with_reference(reference)
                            .with_note(cmd.reason.clone()),
                    );
                }
            }
        }

        let mut cancelled = bill;
        cancelled.status = BillStatus::Cancelled;
        if let Some(reason) = &cmd.reason {
            cancelled.notes = Some(match cancelled.notes.take() {
                Some(notes) => format!("{notes}\ncancelled: {reason}"),
                None => format!("cancelled: {reason}"),
            });
        }
        let released = unit.changes.len();
        let unit = unit.bill(BillWrite::update(cancelled.clone()));
        let bill = self.commit_bill(unit, cancelled.id).await?;

        Self::record_transition(bill.bill_type, "cancelled");
        tracing::info!(bill_id = %bill.id, bill_type = %bill.bill_type, released, "bill cancelled");
        Ok(bill)
    }

    /// Opens the entry bill for a completed exit bill. No stock moves here.
    #[tracing::instrument(
        skip(self, actor, cmd),
        fields(franchise_id = %cmd.franchise_id, exit_bill_id = %cmd.exit_bill_id)
    )]
    pub async fn create_entry_bill(
        &self,
        actor: &ActorContext,
        cmd: CreateEntryBill,
    ) -> Result<WarehouseBill> {
        self.ledger
            .authorize(actor, Role::Manager, OwnerScope::Franchise(cmd.franchise_id))
            .await?;

        let exit = self.load_bill(cmd.exit_bill_id).await?;
        Self::expect_type(&exit, BillType::Exit)?;
        if exit.status != BillStatus::Completed {
            return Err(TransferError::ExitBillNotCompleted {
                exit_bill_id: exit.id,
                status: exit.status,
            });
        }
        if exit.franchise_id != cmd.franchise_id {
            return Err(TransferError::FranchiseMismatch {
                exit_bill_id: exit.id,
                expected: exit.franchise_id,
                actual: cmd.franchise_id,
            });
        }
        if let Some(entry) = self.ledger.store().find_entry_bill(exit.id).await? {
            return Err(TransferError::EntryBillExists {
                exit_bill_id: exit.id,
                entry_bill_id: entry.id,
            });
        }

        let items = exit
            .items
            .iter()
            .map(|line| WarehouseBillItem::new(line.variant_id, line.quantity, line.unit_price))
            .collect();
        let mut bill = WarehouseBill::draft(
            BillType::Entry,
            exit.company_id,
            exit.franchise_id,
            items,
            actor.user_id,
        );
        bill.related_bill_id = Some(exit.id);
        bill.notes = cmd.notes;

        let unit = UnitOfWork::new(actor.user_id).bill(BillWrite::insert(bill.clone()));
        let bill = self.commit_bill(unit, bill.id).await?;

        Self::record_transition(BillType::Entry, "created");
        tracing::info!(bill_id = %bill.id, exit_bill_id = %exit.id, "entry bill created");
        Ok(bill)
    }

    /// Records what arrived and classifies each line. No stock moves here.
    #[tracing::instrument(skip(self, actor, cmd), fields(bill_id = %cmd.bill_id))]
    pub async fn verify_entry_bill(
        &self,
        actor: &ActorContext,
        cmd: VerifyEntryBill,
    ) -> Result<WarehouseBill> {
        let mut bill = self.load_bill(cmd.bill_id).await?;
        Self::expect_type(&bill, BillType::Entry)?;
        self.ledger
            .authorize(actor, Role::Manager, OwnerScope::Franchise(bill.franchise_id))
            .await?;
        if !bill.status.can_verify() {
            return Err(Self::transition_denied(&bill, "verify"));
        }

        let extras: Vec<VariantId> = cmd
            .received
            .iter()
            .filter(|r| r.received_quantity > 0 && bill.item_for_variant(r.variant_id).is_none())
            .map(|r| r.variant_id)
            .collect();

        let exit_prices: HashMap<VariantId, Money> = match bill.related_bill_id {
            Some(exit_id) => self
                .ledger
                .store()
                .get_bill(exit_id)
                .await?
                .map(|exit| {
                    exit.items
                        .iter()
                        .map(|item| (item.variant_id, item.unit_price))
                        .collect()
                })
                .unwrap_or_default(),
            None => HashMap::new(),
        };
        let catalog = if extras.is_empty() {
            HashMap::new()
        } else {
            self.catalog.lookup_many(&extras).await?
        };

        let mut report = ValidationReport::new();
        let mut seen = HashSet::new();
        for (line, received) in cmd.received.iter().enumerate() {
            let variant = Some(received.variant_id);
            if !seen.insert(received.variant_id) {
                report.push(line, variant, IssueKind::DuplicateVariant);
                continue;
            }
            if extras.contains(&received.variant_id)
                && !exit_prices.contains_key(&received.variant_id)
                && !catalog.contains_key(&received.variant_id)
            {
                report.push(line, variant, IssueKind::UnknownVariant);
            }
        }
        Self::reject(report)?;

        let reconciliation = reconcile_entry_items(&bill.items, &cmd.received, |variant_id| {
            exit_prices
                .get(&variant_id)
                .copied()
                .or_else(|| catalog.get(&variant_id).map(|e| e.retail_price))
        });
        let discrepancies = reconciliation.discrepancy_count();

        bill.items = reconciliation.items;
        bill.verification_status = reconciliation.verification_status;
        bill.status = BillStatus::Verified;
        bill.verified_by = Some(actor.user_id);
        bill.verified_at = Some(Utc::now());
        bill.recalculate_total();

        let unit = UnitOfWork::new(actor.user_id).bill(BillWrite::update(bill.clone()));
        let bill = self.commit_bill(unit, bill.id).await?;

        Self::record_transition(BillType::Entry, "verified");
        tracing::info!(
            bill_id = %bill.id,
            verification_status = bill.verification_status.as_str(),
            discrepancies,
            "entry bill verified"
        );
        Ok(bill)
    }

    /// Credits the franchise with what was received and closes whatever
    /// reservation the exit bill still holds on the company side.
    ///
    /// The company's outbound `transfer` movement was already written when the
    /// exit bill completed, so this step writes the franchise's inbound
    /// `transfer` and, on the company side, only a `release` for reservation
    /// still outstanding under the exit bill's reference (none after a normal
    /// exit completion). Reservations held by other bills are never touched.
    ///
    /// Missing units are credited nowhere; they stay visible through
    /// [`Self::discrepancy_report`].
    #[tracing::instrument(skip(self, actor), fields(bill_id = %cmd.bill_id))]
    pub async fn complete_entry_bill(
        &self,
        actor: &ActorContext,
        cmd: CompleteEntryBill,
    ) -> Result<WarehouseBill> {
        let bill = self.load_bill(cmd.bill_id).await?;
        Self::expect_type(&bill, BillType::Entry)?;
        let franchise_scope = OwnerScope::Franchise(bill.franchise_id);
        self.ledger
            .authorize(actor, Role::Manager, franchise_scope)
            .await?;
        if !bill.status.can_complete(BillType::Entry) {
            return Err(Self::transition_denied(&bill, "complete"));
        }

        let mut changes = Vec::new();

        // Reservations still held for the exit bill; normally none
        if let Some(exit_id) = bill.related_bill_id {
            let company_scope = OwnerScope::Company(bill.company_id);
            let exit_reference = Reference::bill(exit_id);
            let mut outstanding: Vec<(VariantId, i64)> = self
                .ledger
                .outstanding_reservations(company_scope, exit_reference)
                .await?
                .into_iter()
                .collect();
            outstanding.sort();

            let note = Some(format!("closed by entry bill {}", bill.id));
            for (variant_id, held) in outstanding {
                changes.push(
                    StockChange::release(variant_id, company_scope, held)
                        .with_reference(exit_reference)
                        .with_note(note.clone()),
                );
            }
        }

        let entry_reference = Reference::bill(bill.id);
        let mut credited = 0u64;
        for item in &bill.items {
            let received = item.received_quantity.unwrap_or(0);
            if received == 0 {
                continue;
            }
            credited += u64::from(received);
            changes.push(
                StockChange::add(
                    item.variant_id,
                    franchise_scope,
                    i64::from(received),
                    MovementType::Transfer,
                )
                .with_reference(entry_reference),
            );
        }

        let mut completed = bill;
        completed.status = BillStatus::Completed;
        let unit = UnitOfWork::new(actor.user_id)
            .changes(changes)
            .bill(BillWrite::update(completed.clone()));
        let bill = self.commit_bill(unit, completed.id).await?;

        Self::record_transition(BillType::Entry, "completed");
        tracing::info!(bill_id = %bill.id, credited, "entry bill completed");
        Ok(bill)
    }

    /// Loads a bill visible to the caller.
    #[tracing::instrument(skip(self, actor))]
    pub async fn get_bill(&self, actor: &ActorContext, bill_id: BillId) -> Result<WarehouseBill> {
        let bill = self.load_bill(bill_id).await?;
        self.authorize_read(actor, &bill).await?;
        Ok(bill)
    }

    /// Lists bills, restricted to the caller's own company or franchise.
    #[tracing::instrument(skip(self, actor))]
    pub async fn list_bills(
        &self,
        actor: &ActorContext,
        query: BillQuery,
    ) -> Result<Vec<WarehouseBill>> {
        let query = match actor.scope {
            OwnerScope::Company(company_id) => query.company(company_id),
            OwnerScope::Franchise(franchise_id) => query.franchise(franchise_id),
        };
        Ok(self.ledger.store().query_bills(query).await?)
    }

    /// Summarises the discrepancies recorded on an entry bill.
    #[tracing::instrument(skip(self, actor))]
    pub async fn discrepancy_report(
        &self,
        actor: &ActorContext,
        bill_id: BillId,
    ) -> Result<DiscrepancyReport> {
        let bill = self.load_bill(bill_id).await?;
        Self::expect_type(&bill, BillType::Entry)?;
        self.authorize_read(actor, &bill).await?;
        Ok(DiscrepancyReport::from_bill(&bill))
    }

    async fn authorize_read(&self, actor: &ActorContext, bill: &WarehouseBill) -> Result<()> {
        if actor.scope == OwnerScope::Company(bill.company_id) {
            return Ok(());
        }
        self.ledger
            .authorize(actor, Role::Employee, OwnerScope::Franchise(bill.franchise_id))
            .await?;
        Ok(())
    }

    async fn load_bill(&self, bill_id: BillId) -> Result<WarehouseBill> {
        self.ledger
            .store()
            .get_bill(bill_id)
            .await?
            .ok_or(TransferError::BillNotFound(bill_id))
    }

    async fn commit_bill(&self, unit: UnitOfWork, bill_id: BillId) -> Result<WarehouseBill> {
        let receipt = self.ledger.commit(unit).await?;
        receipt
            .bill(bill_id)
            .cloned()
            .ok_or(TransferError::BillNotFound(bill_id))
    }

    fn expect_type(bill: &WarehouseBill, expected: BillType) -> Result<()> {
        if bill.bill_type != expected {
            return Err(TransferError::WrongBillType {
                bill_id: bill.id,
                expected,
                actual: bill.bill_type,
            });
        }
        Ok(())
    }

    fn transition_denied(bill: &WarehouseBill, action: &'static str) -> TransferError {
        tracing::warn!(bill_id = %bill.id, status = %bill.status, action, "transition rejected");
        TransferError::InvalidTransition {
            bill_id: bill.id,
            status: bill.status,
            action,
        }
    }

    fn reject(report: ValidationReport) -> Result<()> {
        if !report.is_empty() {
            metrics::counter!("transfer_validation_failures_total").increment(1);
            tracing::warn!(issues = report.len(), "transfer request rejected");
        }
        report.into_result()
    }

    fn record_transition(bill_type: BillType, transition: &'static str) {
        metrics::counter!(
            "warehouse_bills_total",
            "bill_type" => bill_type.as_str(),
            "transition" => transition
        )
        .increment(1);
    }
}
