//! Transfer commands.
//!
//! Each command names exactly the fields its operation may change.

use common::{BillId, BillItemId, CompanyId, FranchiseId, Money, VariantId};
use domain::ReceivedItem;
use serde::{Deserialize, Serialize};

/// A requested line of a new exit bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Defaults to the catalog retail price.
    pub unit_price: Option<Money>,
}

impl ExitLine {
    pub fn new(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            variant_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn priced(variant_id: VariantId, quantity: u32, unit_price: Money) -> Self {
        Self {
            variant_id,
            quantity,
            unit_price: Some(unit_price),
        }
    }
}

/// Command to open a draft exit bill and reserve its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExitBill {
    pub company_id: CompanyId,
    pub franchise_id: FranchiseId,
    pub items: Vec<ExitLine>,
    pub notes: Option<String>,
}

impl CreateExitBill {
    pub fn new(company_id: CompanyId, franchise_id: FranchiseId, items: Vec<ExitLine>) -> Self {
        Self {
            company_id,
            franchise_id,
            items,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// One line of the replacement item set of a draft exit bill.
///
/// `item_id` refers to an existing line to keep (possibly changed); `None`
/// adds a new line. Existing lines not referenced are removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitLineUpdate {
    pub item_id: Option<BillItemId>,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Option<Money>,
}

impl ExitLineUpdate {
    /// Keeps an existing line, setting its variant and quantity.
    pub fn existing(item_id: BillItemId, variant_id: VariantId, quantity: u32) -> Self {
        Self {
            item_id: Some(item_id),
            variant_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn added(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            item_id: None,
            variant_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn with_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }
}

/// Command to replace the items of a draft exit bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExitBillItems {
    pub bill_id: BillId,
    pub items: Vec<ExitLineUpdate>,
    /// Recorded on every movement the update produces.
    pub reason: Option<String>,
}

impl UpdateExitBillItems {
    pub fn new(bill_id: BillId, items: Vec<ExitLineUpdate>) -> Self {
        Self {
            bill_id,
            items,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Command to ship a draft exit bill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompleteExitBill {
    pub bill_id: BillId,
}

impl CompleteExitBill {
    pub fn new(bill_id: BillId) -> Self {
        Self { bill_id }
    }
}

/// Command to cancel a draft bill of either type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelWarehouseBill {
    pub bill_id: BillId,
    pub reason: Option<String>,
}

impl CancelWarehouseBill {
    pub fn new(bill_id: BillId) -> Self {
        Self {
            bill_id,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Command to open the entry bill receiving a completed exit bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntryBill {
    pub franchise_id: FranchiseId,
    pub exit_bill_id: BillId,
    pub notes: Option<String>,
}

impl CreateEntryBill {
    pub fn new(franchise_id: FranchiseId, exit_bill_id: BillId) -> Self {
        Self {
            franchise_id,
            exit_bill_id,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Command to record what physically arrived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEntryBill {
    pub bill_id: BillId,
    pub received: Vec<ReceivedItem>,
}

impl VerifyEntryBill {
    pub fn new(bill_id: BillId, received: Vec<ReceivedItem>) -> Self {
        Self { bill_id, received }
    }
}

/// Command to credit the franchise with a verified entry bill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompleteEntryBill {
    pub bill_id: BillId,
}

impl CompleteEntryBill {
    pub fn new(bill_id: BillId) -> Self {
        Self { bill_id }
    }
}
