//! Discrepancy reporting for entry bills.

use common::{BillId, BillItemId, VariantId};
use inventory_store::{DiscrepancyType, VerificationStatus, WarehouseBill};
use serde::{Deserialize, Serialize};

/// One line whose received quantity differs from what was expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyLine {
    pub item_id: BillItemId,
    pub variant_id: VariantId,
    pub expected_quantity: u32,
    pub received_quantity: u32,
    /// Units expected but never credited to the franchise.
    pub shortfall: u32,
    /// Units received beyond what was expected.
    pub excess: u32,
    pub discrepancy_type: DiscrepancyType,
    pub notes: Option<String>,
}

/// Summary of every discrepancy recorded on an entry bill.
///
/// Shortfalls are not written off anywhere in the ledger; this report is
/// where they surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub entry_bill_id: BillId,
    pub exit_bill_id: Option<BillId>,
    pub verification_status: VerificationStatus,
    pub lines: Vec<DiscrepancyLine>,
    pub total_shortfall: u64,
    pub total_excess: u64,
}

impl DiscrepancyReport {
    pub fn from_bill(bill: &WarehouseBill) -> Self {
        let lines: Vec<DiscrepancyLine> = bill
            .items
            .iter()
            .filter(|item| item.discrepancy_type != DiscrepancyType::None)
            .map(|item| {
                let received = item.received_quantity.unwrap_or(0);
                DiscrepancyLine {
                    item_id: item.id,
                    variant_id: item.variant_id,
                    expected_quantity: item.expected_quantity,
                    received_quantity: received,
                    shortfall: item.shortfall(),
                    excess: received.saturating_sub(item.expected_quantity),
                    discrepancy_type: item.discrepancy_type,
                    notes: item.discrepancy_notes.clone(),
                }
            })
            .collect();

        Self {
            entry_bill_id: bill.id,
            exit_bill_id: bill.related_bill_id,
            verification_status: bill.verification_status,
            total_shortfall: lines.iter().map(|l| u64::from(l.shortfall)).sum(),
            total_excess: lines.iter().map(|l| u64::from(l.excess)).sum(),
            lines,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.lines.is_empty()
    }
}
