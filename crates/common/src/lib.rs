//! Shared types for the inventory ledger and transfer engine.
//!
//! Everything here is plain data: typed identifiers, the exclusive
//! ownership scope of an inventory record, integer money and the ranked
//! role carried by every caller.

pub mod money;
pub mod role;
pub mod scope;
pub mod types;

pub use money::Money;
pub use role::{ActorContext, ParseRoleError, Role};
pub use scope::OwnerScope;
pub use types::{
    BillId, BillItemId, CompanyId, FranchiseId, InventoryId, MovementId, SaleId, UserId,
    VariantId,
};
