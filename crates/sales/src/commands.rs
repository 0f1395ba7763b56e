//! Sale and refund commands.

use common::{OwnerScope, SaleId, VariantId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl SaleLine {
    pub fn new(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            variant_id,
            quantity,
        }
    }
}

/// Command to debit the stock sold at a point of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleCommand {
    /// Issued by the caller; every movement of the sale references it.
    pub sale_id: SaleId,
    pub scope: OwnerScope,
    pub lines: Vec<SaleLine>,
}

impl SaleCommand {
    pub fn new(scope: OwnerScope, lines: Vec<SaleLine>) -> Self {
        Self {
            sale_id: SaleId::new(),
            scope,
            lines,
        }
    }

    pub fn with_sale_id(mut self, sale_id: SaleId) -> Self {
        self.sale_id = sale_id;
        self
    }
}

/// Command to return previously sold units to stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundCommand {
    pub sale_id: SaleId,
    pub scope: OwnerScope,
    pub lines: Vec<SaleLine>,
    pub reason: Option<String>,
}

impl RefundCommand {
    pub fn new(sale_id: SaleId, scope: OwnerScope, lines: Vec<SaleLine>) -> Self {
        Self {
            sale_id,
            scope,
            lines,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
