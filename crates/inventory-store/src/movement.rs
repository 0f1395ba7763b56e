//! The append-only movement log.

use chrono::{DateTime, Utc};
use common::{InventoryId, MovementId, OwnerScope, UserId, VariantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StoreError;

/// Cause of a counter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    Adjustment,
    Transfer,
    Reserve,
    Release,
    Return,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "purchase",
            MovementType::Sale => "sale",
            MovementType::Adjustment => "adjustment",
            MovementType::Transfer => "transfer",
            MovementType::Reserve => "reserve",
            MovementType::Release => "release",
            MovementType::Return => "return",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "purchase" => Ok(MovementType::Purchase),
            "sale" => Ok(MovementType::Sale),
            "adjustment" => Ok(MovementType::Adjustment),
            "transfer" => Ok(MovementType::Transfer),
            "reserve" => Ok(MovementType::Reserve),
            "release" => Ok(MovementType::Release),
            "return" => Ok(MovementType::Return),
            other => Err(StoreError::InvalidData(format!(
                "unknown movement type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which counter of the record a movement changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Stock,
    Reserved,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::Stock => "stock",
            Counter::Reserved => "reserved",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "stock" => Ok(Counter::Stock),
            "reserved" => Ok(Counter::Reserved),
            other => Err(StoreError::InvalidData(format!("unknown counter: {other}"))),
        }
    }
}

/// Kind of document a movement points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    WarehouseBill,
    Sale,
    Manual,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::WarehouseBill => "warehouse_bill",
            ReferenceType::Sale => "sale",
            ReferenceType::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "warehouse_bill" => Ok(ReferenceType::WarehouseBill),
            "sale" => Ok(ReferenceType::Sale),
            "manual" => Ok(ReferenceType::Manual),
            other => Err(StoreError::InvalidData(format!(
                "unknown reference type: {other}"
            ))),
        }
    }
}

/// Typed back-link from a movement to the document that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
}

impl Reference {
    pub fn new(reference_type: ReferenceType, reference_id: impl Into<Uuid>) -> Self {
        Self {
            reference_type,
            reference_id: reference_id.into(),
        }
    }

    pub fn bill(bill_id: common::BillId) -> Self {
        Self::new(ReferenceType::WarehouseBill, bill_id)
    }

    pub fn sale(sale_id: common::SaleId) -> Self {
        Self::new(ReferenceType::Sale, sale_id)
    }
}

/// One immutable audit entry describing a single counter change.
///
/// `quantity` is signed: positive when the counter grew, negative when it
/// shrank, so `previous + quantity == new` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub inventory_id: InventoryId,
    pub variant_id: VariantId,
    pub scope: OwnerScope,
    pub movement_type: MovementType,
    pub counter: Counter,
    pub quantity: i64,
    pub previous_value: i64,
    pub new_value: i64,
    pub reference: Option<Reference>,
    pub note: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_text_roundtrip() {
        for ty in [
            MovementType::Purchase,
            MovementType::Sale,
            MovementType::Adjustment,
            MovementType::Transfer,
            MovementType::Reserve,
            MovementType::Release,
            MovementType::Return,
        ] {
            assert_eq!(MovementType::parse(ty.as_str()).unwrap(), ty);
        }
        assert!(MovementType::parse("shrink").is_err());
    }

    #[test]
    fn reference_helpers() {
        let bill = common::BillId::new();
        let reference = Reference::bill(bill);
        assert_eq!(reference.reference_type, ReferenceType::WarehouseBill);
        assert_eq!(reference.reference_id, bill.as_uuid());
    }
}
