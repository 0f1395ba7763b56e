use chrono::{DateTime, Utc};
use common::{CompanyId, FranchiseId, InventoryId, OwnerScope, VariantId};

use crate::{BillStatus, BillType, InventoryMovement, MovementType, Reference, WarehouseBill};

/// Builder for filtering the movement log.
///
/// Results are always returned in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MovementQuery {
    pub inventory_id: Option<InventoryId>,
    pub variant_id: Option<VariantId>,
    pub scope: Option<OwnerScope>,
    /// Any of these types.
    pub movement_types: Option<Vec<MovementType>>,
    pub reference: Option<Reference>,
    /// Inclusive lower bound.
    pub from_timestamp: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub to_timestamp: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl MovementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Movements of one (variant, scope) record.
    pub fn for_record(variant_id: VariantId, scope: OwnerScope) -> Self {
        Self {
            variant_id: Some(variant_id),
            scope: Some(scope),
            ..Default::default()
        }
    }

    /// Movements caused by one document.
    pub fn for_reference(reference: Reference) -> Self {
        Self {
            reference: Some(reference),
            ..Default::default()
        }
    }

    pub fn inventory_id(mut self, id: InventoryId) -> Self {
        self.inventory_id = Some(id);
        self
    }

    pub fn variant_id(mut self, id: VariantId) -> Self {
        self.variant_id = Some(id);
        self
    }

    pub fn scope(mut self, scope: OwnerScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn movement_type(mut self, movement_type: MovementType) -> Self {
        self.movement_types = Some(vec![movement_type]);
        self
    }

    pub fn movement_types(mut self, movement_types: Vec<MovementType>) -> Self {
        self.movement_types = Some(movement_types);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the movement passes every filter except paging.
    pub fn matches(&self, movement: &InventoryMovement) -> bool {
        if let Some(id) = self.inventory_id
            && movement.inventory_id != id
        {
            return false;
        }
        if let Some(id) = self.variant_id
            && movement.variant_id != id
        {
            return false;
        }
        if let Some(scope) = self.scope
            && movement.scope != scope
        {
            return false;
        }
        if let Some(ref types) = self.movement_types
            && !types.contains(&movement.movement_type)
        {
            return false;
        }
        if let Some(reference) = self.reference
            && movement.reference != Some(reference)
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && movement.created_at < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && movement.created_at > to
        {
            return false;
        }
        true
    }
}

/// Filter for listing warehouse bills, newest first.
#[derive(Debug, Clone, Default)]
pub struct BillQuery {
    pub company_id: Option<CompanyId>,
    pub franchise_id: Option<FranchiseId>,
    pub bill_type: Option<BillType>,
    pub status: Option<BillStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl BillQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn company(mut self, id: CompanyId) -> Self {
        self.company_id = Some(id);
        self
    }

    pub fn franchise(mut self, id: FranchiseId) -> Self {
        self.franchise_id = Some(id);
        self
    }

    pub fn bill_type(mut self, bill_type: BillType) -> Self {
        self.bill_type = Some(bill_type);
        self
    }

    pub fn status(mut self, status: BillStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn matches(&self, bill: &WarehouseBill) -> bool {
        self.company_id.is_none_or(|id| bill.company_id == id)
            && self.franchise_id.is_none_or(|id| bill.franchise_id == id)
            && self.bill_type.is_none_or(|ty| bill.bill_type == ty)
            && self.status.is_none_or(|status| bill.status == status)
    }
}
