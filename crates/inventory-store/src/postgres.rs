use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    BillId, BillItemId, CompanyId, FranchiseId, InventoryId, Money, MovementId, OwnerScope,
    UserId, VariantId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::store::{
    RecordKey, WorkingRecord, apply_changes, lock_order, record_commit_metrics,
    validate_unit_of_work,
};
use crate::{
    BillQuery, BillStatus, BillType, BillWrite, CommitOptions, CommitReceipt, Counter,
    DiscrepancyType, InventoryMovement, InventoryRecord, InventoryStore, MovementQuery,
    MovementType, NetStockLimit, Reference, ReferenceType, Result, StoreError, UnitOfWork,
    VerificationStatus, Version, WarehouseBill, WarehouseBillItem,
};

const RECORD_COLUMNS: &str = "id, variant_id, owner_kind, owner_id, stock, reserved_stock, is_active, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, inventory_id, variant_id, owner_kind, owner_id, movement_type, counter, quantity, previous_value, new_value, reference_type, reference_id, note, created_by, created_at";

const BILL_COLUMNS: &str = "id, company_id, franchise_id, bill_type, related_bill_id, status, verification_status, total_amount, notes, created_by, verified_by, verified_at, created_at, updated_at, version";

const ITEM_COLUMNS: &str = "id, bill_id, variant_id, quantity, expected_quantity, received_quantity, unit_price, total_amount, discrepancy_type, discrepancy_notes";

/// PostgreSQL-backed inventory store.
///
/// Commits run in one transaction and lock every touched record with
/// `SELECT ... FOR UPDATE` in key order.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Creates a new PostgreSQL inventory store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_scope(row: &PgRow) -> Result<OwnerScope> {
        let kind: String = row.try_get("owner_kind")?;
        let id: Uuid = row.try_get("owner_id")?;
        OwnerScope::from_parts(&kind, id)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown owner kind: {kind}")))
    }

    fn row_to_record(row: &PgRow) -> Result<InventoryRecord> {
        Ok(InventoryRecord {
            id: InventoryId::from_uuid(row.try_get("id")?),
            variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
            scope: Self::row_to_scope(row)?,
            stock: row.try_get("stock")?,
            reserved_stock: row.try_get("reserved_stock")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_movement(row: &PgRow) -> Result<InventoryMovement> {
        let reference_type: Option<String> = row.try_get("reference_type")?;
        let reference_id: Option<Uuid> = row.try_get("reference_id")?;
        let reference = match (reference_type, reference_id) {
            (Some(ty), Some(id)) => Some(Reference::new(ReferenceType::parse(&ty)?, id)),
            _ => None,
        };

        Ok(InventoryMovement {
            id: MovementId::from_uuid(row.try_get("id")?),
            inventory_id: InventoryId::from_uuid(row.try_get("inventory_id")?),
            variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
            scope: Self::row_to_scope(row)?,
            movement_type: MovementType::parse(row.try_get("movement_type")?)?,
            counter: Counter::parse(row.try_get("counter")?)?,
            quantity: row.try_get("quantity")?,
            previous_value: row.try_get("previous_value")?,
            new_value: row.try_get("new_value")?,
            reference,
            note: row.try_get("note")?,
            created_by: UserId::from_uuid(row.try_get("created_by")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<WarehouseBillItem> {
        let received: Option<i32> = row.try_get("received_quantity")?;
        Ok(WarehouseBillItem {
            id: BillItemId::from_uuid(row.try_get("id")?),
            variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
            quantity: from_db_quantity(row.try_get("quantity")?)?,
            expected_quantity: from_db_quantity(row.try_get("expected_quantity")?)?,
            received_quantity: received.map(from_db_quantity).transpose()?,
            unit_price: Money::from_cents(row.try_get("unit_price")?),
            total_amount: Money::from_cents(row.try_get("total_amount")?),
            discrepancy_type: DiscrepancyType::parse(row.try_get("discrepancy_type")?)?,
            discrepancy_notes: row.try_get("discrepancy_notes")?,
        })
    }

    fn row_to_bill(row: &PgRow, items: Vec<WarehouseBillItem>) -> Result<WarehouseBill> {
        let related: Option<Uuid> = row.try_get("related_bill_id")?;
        let verified_by: Option<Uuid> = row.try_get("verified_by")?;

        Ok(WarehouseBill {
            id: BillId::from_uuid(row.try_get("id")?),
            company_id: CompanyId::from_uuid(row.try_get("company_id")?),
            franchise_id: FranchiseId::from_uuid(row.try_get("franchise_id")?),
            bill_type: BillType::parse(row.try_get("bill_type")?)?,
            related_bill_id: related.map(BillId::from_uuid),
            status: BillStatus::parse(row.try_get("status")?)?,
            verification_status: VerificationStatus::parse(row.try_get("verification_status")?)?,
            total_amount: Money::from_cents(row.try_get("total_amount")?),
            items,
            notes: row.try_get("notes")?,
            created_by: UserId::from_uuid(row.try_get("created_by")?),
            verified_by: verified_by.map(UserId::from_uuid),
            verified_at: row.try_get::<Option<DateTime<Utc>>, _>("verified_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    /// Loads the line items of several bills in one round trip.
    async fn load_items(&self, bill_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<WarehouseBillItem>>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM warehouse_bill_items WHERE bill_id = ANY($1) ORDER BY bill_id, position ASC"
        ))
        .bind(bill_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<WarehouseBillItem>> = HashMap::new();
        for row in &rows {
            let bill_id: Uuid = row.try_get("bill_id")?;
            items.entry(bill_id).or_default().push(Self::row_to_item(row)?);
        }
        Ok(items)
    }

    async fn rows_to_bills(&self, rows: Vec<PgRow>) -> Result<Vec<WarehouseBill>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut items = self.load_items(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_bill(row, items.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn lock_record(
        tx: &mut Transaction<'_, Postgres>,
        key: RecordKey,
    ) -> Result<WorkingRecord> {
        let (variant_id, scope) = key;
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE variant_id = $1 AND owner_kind = $2 AND owner_id = $3 FOR UPDATE"
        ))
        .bind(variant_id.as_uuid())
        .bind(scope.kind())
        .bind(scope.owner_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        Ok(match row {
            Some(row) => WorkingRecord::existing(Self::row_to_record(&row)?),
            None => WorkingRecord::missing(key),
        })
    }

    /// Net committed stock change under a limit's reference. Read after the
    /// record lock is held, so it includes every commit that raced ahead.
    async fn committed_net(
        tx: &mut Transaction<'_, Postgres>,
        limit: &NetStockLimit,
    ) -> Result<i64> {
        let net: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM inventory_movements
            WHERE reference_type = $1 AND reference_id = $2 AND variant_id = $3
              AND owner_kind = $4 AND owner_id = $5 AND counter = $6
            "#,
        )
        .bind(limit.reference.reference_type.as_str())
        .bind(limit.reference.reference_id)
        .bind(limit.variant_id.as_uuid())
        .bind(limit.scope.kind())
        .bind(limit.scope.owner_uuid())
        .bind(Counter::Stock.as_str())
        .fetch_one(&mut **tx)
        .await?;
        Ok(net)
    }

    async fn write_record(
        tx: &mut Transaction<'_, Postgres>,
        entry: &WorkingRecord,
    ) -> Result<()> {
        let record = &entry.record;

        if entry.persisted {
            sqlx::query(
                r#"
                UPDATE inventory_records
                SET stock = $2, reserved_stock = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(record.stock)
            .bind(record.reserved_stock)
            .bind(record.updated_at)
            .execute(&mut **tx)
            .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO inventory_records (id, variant_id, owner_kind, owner_id, stock, reserved_stock, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.variant_id.as_uuid())
        .bind(record.scope.kind())
        .bind(record.scope.owner_uuid())
        .bind(record.stock)
        .bind(record.reserved_stock)
        .bind(record.is_active)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            // Another transaction created the record after our lock attempt
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_variant_scope")
            {
                return StoreError::RecordConflict {
                    variant_id: record.variant_id,
                    scope: record.scope,
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn insert_movement(
        tx: &mut Transaction<'_, Postgres>,
        movement: &InventoryMovement,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (id, inventory_id, variant_id, owner_kind, owner_id, movement_type, counter, quantity, previous_value, new_value, reference_type, reference_id, note, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.inventory_id.as_uuid())
        .bind(movement.variant_id.as_uuid())
        .bind(movement.scope.kind())
        .bind(movement.scope.owner_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.counter.as_str())
        .bind(movement.quantity)
        .bind(movement.previous_value)
        .bind(movement.new_value)
        .bind(movement.reference.map(|r| r.reference_type.as_str()))
        .bind(movement.reference.map(|r| r.reference_id))
        .bind(&movement.note)
        .bind(movement.created_by.as_uuid())
        .bind(movement.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Writes one bill after checking it is still at the expected version.
    async fn write_bill(
        tx: &mut Transaction<'_, Postgres>,
        write: &BillWrite,
        bill: &WarehouseBill,
    ) -> Result<()> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM warehouse_bills WHERE id = $1 FOR UPDATE")
                .bind(bill.id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;

        let actual = current.map(Version::new).unwrap_or_default();
        if actual != write.expected_version {
            return Err(StoreError::ConcurrencyConflict {
                bill_id: bill.id,
                expected: write.expected_version,
                actual,
            });
        }

        if current.is_none() {
            sqlx::query(
                r#"
                INSERT INTO warehouse_bills (id, company_id, franchise_id, bill_type, related_bill_id, status, verification_status, total_amount, notes, created_by, verified_by, verified_at, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(bill.id.as_uuid())
            .bind(bill.company_id.as_uuid())
            .bind(bill.franchise_id.as_uuid())
            .bind(bill.bill_type.as_str())
            .bind(bill.related_bill_id.map(|id| id.as_uuid()))
            .bind(bill.status.as_str())
            .bind(bill.verification_status.as_str())
            .bind(bill.total_amount.cents())
            .bind(&bill.notes)
            .bind(bill.created_by.as_uuid())
            .bind(bill.verified_by.map(|id| id.as_uuid()))
            .bind(bill.verified_at)
            .bind(bill.created_at)
            .bind(bill.updated_at)
            .bind(bill.version.as_i64())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_entry_per_exit")
                    && let Some(exit_bill_id) = bill.related_bill_id
                {
                    return StoreError::DuplicateEntryBill { exit_bill_id };
                }
                StoreError::Database(e)
            })?;
        } else {
            sqlx::query(
                r#"
                UPDATE warehouse_bills
                SET status = $2, verification_status = $3, total_amount = $4, notes = $5,
                    verified_by = $6, verified_at = $7, updated_at = $8, version = $9
                WHERE id = $1
                "#,
            )
            .bind(bill.id.as_uuid())
            .bind(bill.status.as_str())
            .bind(bill.verification_status.as_str())
            .bind(bill.total_amount.cents())
            .bind(&bill.notes)
            .bind(bill.verified_by.map(|id| id.as_uuid()))
            .bind(bill.verified_at)
            .bind(bill.updated_at)
            .bind(bill.version.as_i64())
            .execute(&mut **tx)
            .await?;

            sqlx::query("DELETE FROM warehouse_bill_items WHERE bill_id = $1")
                .bind(bill.id.as_uuid())
                .execute(&mut **tx)
                .await?;
        }

        for (position, item) in bill.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO warehouse_bill_items (id, bill_id, position, variant_id, quantity, expected_quantity, received_quantity, unit_price, total_amount, discrepancy_type, discrepancy_notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(bill.id.as_uuid())
            .bind(position as i32)
            .bind(item.variant_id.as_uuid())
            .bind(to_db_quantity(item.quantity)?)
            .bind(to_db_quantity(item.expected_quantity)?)
            .bind(item.received_quantity.map(to_db_quantity).transpose()?)
            .bind(item.unit_price.cents())
            .bind(item.total_amount.cents())
            .bind(item.discrepancy_type.as_str())
            .bind(&item.discrepancy_notes)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::InvalidData(format!("quantity {quantity} out of range")))
}

fn from_db_quantity(quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .map_err(|_| StoreError::InvalidData(format!("negative stored quantity {quantity}")))
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn commit(&self, unit: UnitOfWork, options: CommitOptions) -> Result<CommitReceipt> {
        validate_unit_of_work(&unit)?;
        let started = Instant::now();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // Lock in a fixed order so concurrent commits cannot deadlock
        let mut working = BTreeMap::new();
        for key in lock_order(&unit.changes) {
            let entry = Self::lock_record(&mut tx, key).await?;
            working.insert(key, entry);
        }

        let movements = apply_changes(
            &mut working,
            &unit.changes,
            options.release_policy,
            unit.actor,
            now,
        )?;

        for limit in &unit.limits {
            let committed = Self::committed_net(&mut tx, limit).await?;
            limit.check(committed, &movements)?;
        }

        let mut records = Vec::new();
        for entry in working.values().filter(|entry| entry.dirty) {
            Self::write_record(&mut tx, entry).await?;
            records.push(entry.record.clone());
        }

        for movement in &movements {
            Self::insert_movement(&mut tx, movement).await?;
        }

        let mut bills = Vec::with_capacity(unit.bills.len());
        for write in &unit.bills {
            let mut bill = write.bill.clone();
            bill.version = write.expected_version.next();
            bill.updated_at = now;
            Self::write_bill(&mut tx, write, &bill).await?;
            bills.push(bill);
        }

        tx.commit().await?;
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
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE variant_id = $1 AND owner_kind = $2 AND owner_id = $3"
        ))
        .bind(variant_id.as_uuid())
        .bind(scope.kind())
        .bind(scope.owner_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn list_records(&self, scope: OwnerScope) -> Result<Vec<InventoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE owner_kind = $1 AND owner_id = $2 ORDER BY created_at ASC"
        ))
        .bind(scope.kind())
        .bind(scope.owner_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn ensure_records(
        &self,
        scope: OwnerScope,
        variants: &[VariantId],
    ) -> Result<Vec<InventoryRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::new();

        for &variant_id in variants {
            let record = InventoryRecord::new(variant_id, scope);
            let row = sqlx::query(&format!(
                r#"
                INSERT INTO inventory_records (id, variant_id, owner_kind, owner_id, stock, reserved_stock, is_active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, 0, 0, TRUE, $5, $5)
                ON CONFLICT (variant_id, owner_kind, owner_id) DO NOTHING
                RETURNING {RECORD_COLUMNS}
                "#
            ))
            .bind(record.id.as_uuid())
            .bind(variant_id.as_uuid())
            .bind(scope.kind())
            .bind(scope.owner_uuid())
            .bind(record.created_at)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                created.push(Self::row_to_record(&row)?);
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn set_record_active(
        &self,
        variant_id: VariantId,
        scope: OwnerScope,
        active: bool,
    ) -> Result<InventoryRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE inventory_records
            SET is_active = $4, updated_at = NOW()
            WHERE variant_id = $1 AND owner_kind = $2 AND owner_id = $3
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(variant_id.as_uuid())
        .bind(scope.kind())
        .bind(scope.owner_uuid())
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_record(&row),
            None => Err(StoreError::RecordNotFound { variant_id, scope }),
        }
    }

    async fn get_bill(&self, bill_id: BillId) -> Result<Option<WarehouseBill>> {
        let rows = sqlx::query(&format!(
            "SELECT {BILL_COLUMNS} FROM warehouse_bills WHERE id = $1"
        ))
        .bind(bill_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.rows_to_bills(rows).await?.into_iter().next())
    }

    async fn find_entry_bill(&self, exit_bill_id: BillId) -> Result<Option<WarehouseBill>> {
        let rows = sqlx::query(&format!(
            "SELECT {BILL_COLUMNS} FROM warehouse_bills WHERE bill_type = 'entry' AND related_bill_id = $1"
        ))
        .bind(exit_bill_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.rows_to_bills(rows).await?.into_iter().next())
    }

    async fn query_bills(&self, query: BillQuery) -> Result<Vec<WarehouseBill>> {
        let mut sql = format!("SELECT {BILL_COLUMNS} FROM warehouse_bills WHERE 1=1");
        let mut param_count = 0;

        if query.company_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND company_id = ${param_count}"));
        }
        if query.franchise_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND franchise_id = ${param_count}"));
        }
        if query.bill_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND bill_type = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.company_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.franchise_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(bill_type) = query.bill_type {
            sqlx_query = sqlx_query.bind(bill_type.as_str());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        self.rows_to_bills(rows).await
    }

    async fn query_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>> {
        let mut sql = format!("SELECT {MOVEMENT_COLUMNS} FROM inventory_movements WHERE 1=1");
        let mut param_count = 0;

        if query.inventory_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND inventory_id = ${param_count}"));
        }
        if query.variant_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND variant_id = ${param_count}"));
        }
        if query.scope.is_some() {
            param_count += 2;
            sql.push_str(&format!(
                " AND owner_kind = ${} AND owner_id = ${param_count}",
                param_count - 1
            ));
        }
        if query.movement_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND movement_type = ANY(${param_count})"));
        }
        if query.reference.is_some() {
            param_count += 2;
            sql.push_str(&format!(
                " AND reference_type = ${} AND reference_id = ${param_count}",
                param_count - 1
            ));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY seq ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.inventory_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.variant_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(scope) = query.scope {
            sqlx_query = sqlx_query.bind(scope.kind()).bind(scope.owner_uuid());
        }
        if let Some(types) = query.movement_types {
            let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(types);
        }
        if let Some(reference) = query.reference {
            sqlx_query = sqlx_query
                .bind(reference.reference_type.as_str())
                .bind(reference.reference_id);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_movement).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
