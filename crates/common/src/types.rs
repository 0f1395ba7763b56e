use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier is its own type so a `VariantId` can never be passed
/// where a `FranchiseId` is expected.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifier of a sellable product variant (owned by the catalog).
    VariantId
);
uuid_id!(
    /// Identifier of a company, the owner of the central warehouse.
    CompanyId
);
uuid_id!(
    /// Identifier of a franchise belonging to a company.
    FranchiseId
);
uuid_id!(
    /// Identifier of the acting user.
    UserId
);
uuid_id!(
    /// Identifier of a warehouse bill (exit or entry).
    BillId
);
uuid_id!(
    /// Identifier of a single line on a warehouse bill.
    BillItemId
);
uuid_id!(
    /// Surrogate key of an inventory record.
    InventoryId
);
uuid_id!(
    /// Identifier of an inventory movement.
    MovementId
);
uuid_id!(
    /// Identifier of a point-of-sale transaction.
    SaleId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_unique_ids() {
        assert_ne!(VariantId::new(), VariantId::new());
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(BillId::from_uuid(uuid).as_uuid(), uuid);
        assert_eq!(Uuid::from(BillId::from(uuid)), uuid);
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = FranchiseId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
