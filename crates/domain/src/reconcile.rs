//! Entry-bill reconciliation: comparing what arrived with what was sent.
//!
//! This is pure computation. The caller loads the bill, resolves prices for
//! unexpected variants and persists the result.

use std::collections::HashMap;

use common::{Money, VariantId};
use inventory_store::{DiscrepancyType, VerificationStatus, WarehouseBillItem};
use serde::{Deserialize, Serialize};

/// Quantity physically received for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedItem {
    pub variant_id: VariantId,
    pub received_quantity: u32,
    /// Overrides the generated discrepancy note for this variant.
    pub notes: Option<String>,
}

impl ReceivedItem {
    pub fn new(variant_id: VariantId, received_quantity: u32) -> Self {
        Self {
            variant_id,
            received_quantity,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Outcome of reconciling an entry bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub items: Vec<WarehouseBillItem>,
    pub verification_status: VerificationStatus,
}

impl Reconciliation {
    pub fn discrepancy_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.discrepancy_type != DiscrepancyType::None)
            .count()
    }
}

/// Classifies every expected line against the received quantities and
/// appends unexpected variants as `Extra` lines.
///
/// `price_of` supplies the unit price for an extra variant; variants it
/// cannot price are recorded at zero. Each variant in `received` is assumed
/// to appear once.
pub fn reconcile_entry_items(
    expected: &[WarehouseBillItem],
    received: &[ReceivedItem],
    price_of: impl Fn(VariantId) -> Option<Money>,
) -> Reconciliation {
    let by_variant: HashMap<VariantId, &ReceivedItem> =
        received.iter().map(|r| (r.variant_id, r)).collect();

    let mut items: Vec<WarehouseBillItem> = expected
        .iter()
        .map(|line| {
            let report = by_variant.get(&line.variant_id);
            let got = report.map(|r| r.received_quantity).unwrap_or(0);
            let expected_qty = line.expected_quantity;

            let (discrepancy_type, generated) = if got == 0 {
                (
                    DiscrepancyType::Missing,
                    Some(format!("expected {expected_qty}, none received")),
                )
            } else if got != expected_qty {
                (
                    DiscrepancyType::QuantityMismatch,
                    Some(format!("expected {expected_qty}, received {got}")),
                )
            } else {
                (DiscrepancyType::None, None)
            };

            let mut item = line.clone();
            item.received_quantity = Some(got);
            item.discrepancy_type = discrepancy_type;
            item.discrepancy_notes = report.and_then(|r| r.notes.clone()).or(generated);
            item.recalculate_total();
            item
        })
        .collect();

    for report in received {
        if report.received_quantity == 0
            || expected.iter().any(|line| line.variant_id == report.variant_id)
        {
            continue;
        }

        let price = price_of(report.variant_id).unwrap_or_default();
        let mut item = WarehouseBillItem::new(report.variant_id, 0, price);
        item.received_quantity = Some(report.received_quantity);
        item.discrepancy_type = DiscrepancyType::Extra;
        item.discrepancy_notes = report.notes.clone().or_else(|| {
            Some(format!(
                "not on exit bill, received {}",
                report.received_quantity
            ))
        });
        item.recalculate_total();
        items.push(item);
    }

    let verification_status = if items
        .iter()
        .any(|item| item.discrepancy_type != DiscrepancyType::None)
    {
        VerificationStatus::DiscrepanciesFound
    } else {
        VerificationStatus::Verified
    };

    Reconciliation {
        items,
        verification_status,
    }
}
