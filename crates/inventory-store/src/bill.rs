//! Warehouse bills: the documents that move stock from a company to a franchise.

use chrono::{DateTime, Utc};
use common::{BillId, BillItemId, CompanyId, FranchiseId, Money, UserId, VariantId};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Version of a stored bill, used for optimistic concurrency on transitions.
///
/// A bill that has never been stored is at version 0; every write bumps it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a bill that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    /// Stock leaving the company warehouse.
    Exit,
    /// Stock arriving at the franchise.
    Entry,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Exit => "exit",
            BillType::Entry => "entry",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "exit" => Ok(BillType::Exit),
            "entry" => Ok(BillType::Entry),
            other => Err(StoreError::InvalidData(format!("unknown bill type: {other}"))),
        }
    }
}

impl std::fmt::Display for BillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a bill.
///
/// ```text
/// Exit:   Draft ──┬──► Completed
///                 └──► Cancelled
///
/// Entry:  Draft ──┬──► Verified ──► Completed
///                 └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    #[default]
    Draft,
    Verified,
    Completed,
    Cancelled,
}

impl BillStatus {
    /// Line items may only change while the bill is a draft.
    pub fn can_modify_items(&self) -> bool {
        matches!(self, BillStatus::Draft)
    }

    pub fn can_verify(&self) -> bool {
        matches!(self, BillStatus::Draft)
    }

    /// Exit bills complete from Draft, entry bills only once verified.
    pub fn can_complete(&self, bill_type: BillType) -> bool {
        match bill_type {
            BillType::Exit => matches!(self, BillStatus::Draft),
            BillType::Entry => matches!(self, BillStatus::Verified),
        }
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, BillStatus::Draft)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BillStatus::Completed | BillStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Draft => "draft",
            BillStatus::Verified => "verified",
            BillStatus::Completed => "completed",
            BillStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "draft" => Ok(BillStatus::Draft),
            "verified" => Ok(BillStatus::Verified),
            "completed" => Ok(BillStatus::Completed),
            "cancelled" => Ok(BillStatus::Cancelled),
            other => Err(StoreError::InvalidData(format!(
                "unknown bill status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking an entry bill against what physically arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    DiscrepanciesFound,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::DiscrepanciesFound => "discrepancies_found",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "discrepancies_found" => Ok(VerificationStatus::DiscrepanciesFound),
            other => Err(StoreError::InvalidData(format!(
                "unknown verification status: {other}"
            ))),
        }
    }
}

/// Per-line mismatch between expected and received quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    #[default]
    None,
    Missing,
    Extra,
    QuantityMismatch,
}

impl DiscrepancyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyType::None => "none",
            DiscrepancyType::Missing => "missing",
            DiscrepancyType::Extra => "extra",
            DiscrepancyType::QuantityMismatch => "quantity_mismatch",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "none" => Ok(DiscrepancyType::None),
            "missing" => Ok(DiscrepancyType::Missing),
            "extra" => Ok(DiscrepancyType::Extra),
            "quantity_mismatch" => Ok(DiscrepancyType::QuantityMismatch),
            other => Err(StoreError::InvalidData(format!(
                "unknown discrepancy type: {other}"
            ))),
        }
    }
}

/// One line of a warehouse bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseBillItem {
    pub id: BillItemId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub expected_quantity: u32,
    pub received_quantity: Option<u32>,
    pub unit_price: Money,
    pub total_amount: Money,
    pub discrepancy_type: DiscrepancyType,
    pub discrepancy_notes: Option<String>,
}

impl WarehouseBillItem {
    /// Creates a line where the expected quantity equals the requested one.
    pub fn new(variant_id: VariantId, quantity: u32, unit_price: Money) -> Self {
        let mut item = Self {
            id: BillItemId::new(),
            variant_id,
            quantity,
            expected_quantity: quantity,
            received_quantity: None,
            unit_price,
            total_amount: Money::zero(),
            discrepancy_type: DiscrepancyType::None,
            discrepancy_notes: None,
        };
        item.recalculate_total();
        item
    }

    /// Quantity the line total is based on: received once verified,
    /// otherwise the requested quantity.
    pub fn effective_quantity(&self) -> u32 {
        self.received_quantity.unwrap_or(self.quantity)
    }

    pub fn recalculate_total(&mut self) {
        self.total_amount = self.unit_price.times(self.effective_quantity());
    }

    /// Units expected but not received.
    pub fn shortfall(&self) -> u32 {
        self.expected_quantity
            .saturating_sub(self.received_quantity.unwrap_or(0))
    }
}

/// A transfer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseBill {
    pub id: BillId,
    pub company_id: CompanyId,
    pub franchise_id: FranchiseId,
    pub bill_type: BillType,
    /// Set on entry bills only: the exit bill this entry receives.
    pub related_bill_id: Option<BillId>,
    pub status: BillStatus,
    pub verification_status: VerificationStatus,
    pub total_amount: Money,
    pub items: Vec<WarehouseBillItem>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: Version,
}

impl WarehouseBill {
    /// Creates an unsaved draft bill.
    pub fn draft(
        bill_type: BillType,
        company_id: CompanyId,
        franchise_id: FranchiseId,
        items: Vec<WarehouseBillItem>,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        let mut bill = Self {
            id: BillId::new(),
            company_id,
            franchise_id,
            bill_type,
            related_bill_id: None,
            status: BillStatus::Draft,
            verification_status: VerificationStatus::Pending,
            total_amount: Money::zero(),
            items,
            notes: None,
            created_by,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        };
        bill.recalculate_total();
        bill
    }

    /// Sums the per-line totals.
    pub fn recalculate_total(&mut self) {
        self.total_amount = self.items.iter().map(|item| item.total_amount).sum();
    }

    pub fn item(&self, item_id: BillItemId) -> Option<&WarehouseBillItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_for_variant(&self, variant_id: VariantId) -> Option<&WarehouseBillItem> {
        self.items.iter().find(|item| item.variant_id == variant_id)
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    pub fn has_discrepancies(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.discrepancy_type != DiscrepancyType::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_completes_from_draft_entry_from_verified() {
        assert!(BillStatus::Draft.can_complete(BillType::Exit));
        assert!(!BillStatus::Verified.can_complete(BillType::Exit));
        assert!(!BillStatus::Draft.can_complete(BillType::Entry));
        assert!(BillStatus::Verified.can_complete(BillType::Entry));
        assert!(!BillStatus::Completed.can_complete(BillType::Entry));
    }

    #[test]
    fn only_drafts_cancel_or_change() {
        assert!(BillStatus::Draft.can_cancel());
        assert!(BillStatus::Draft.can_modify_items());
        for status in [
            BillStatus::Verified,
            BillStatus::Completed,
            BillStatus::Cancelled,
        ] {
            assert!(!status.can_cancel());
            assert!(!status.can_modify_items());
        }
        assert!(BillStatus::Completed.is_terminal());
        assert!(BillStatus::Cancelled.is_terminal());
    }

    #[test]
    fn line_total_prefers_received_quantity() {
        let mut item = WarehouseBillItem::new(VariantId::new(), 10, Money::from_cents(100));
        assert_eq!(item.total_amount.cents(), 1000);

        item.received_quantity = Some(7);
        item.recalculate_total();
        assert_eq!(item.total_amount.cents(), 700);
        assert_eq!(item.shortfall(), 3);
    }

    #[test]
    fn bill_total_sums_lines() {
        let bill = WarehouseBill::draft(
            BillType::Exit,
            CompanyId::new(),
            FranchiseId::new(),
            vec![
                WarehouseBillItem::new(VariantId::new(), 2, Money::from_cents(150)),
                WarehouseBillItem::new(VariantId::new(), 1, Money::from_cents(400)),
            ],
            UserId::new(),
        );
        assert_eq!(bill.total_amount.cents(), 700);
        assert_eq!(bill.total_quantity(), 3);
        assert_eq!(bill.version, Version::initial());
    }

    #[test]
    fn status_text_roundtrip() {
        for status in [
            BillStatus::Draft,
            BillStatus::Verified,
            BillStatus::Completed,
            BillStatus::Cancelled,
        ] {
            assert_eq!(BillStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
