//! Ownership scope of an inventory record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CompanyId, FranchiseId};

/// The owner of an inventory record: the central company warehouse or a
/// single franchise. Exactly one is always set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerScope {
    Company(CompanyId),
    Franchise(FranchiseId),
}

impl OwnerScope {
    /// Returns the company id if this is a company scope.
    pub fn company_id(&self) -> Option<CompanyId> {
        match self {
            OwnerScope::Company(id) => Some(*id),
            OwnerScope::Franchise(_) => None,
        }
    }

    /// Returns the franchise id if this is a franchise scope.
    pub fn franchise_id(&self) -> Option<FranchiseId> {
        match self {
            OwnerScope::Franchise(id) => Some(*id),
            OwnerScope::Company(_) => None,
        }
    }

    /// Returns the scope kind as stored in the database.
    pub fn kind(&self) -> &'static str {
        match self {
            OwnerScope::Company(_) => "company",
            OwnerScope::Franchise(_) => "franchise",
        }
    }

    /// Returns the raw owner UUID regardless of kind.
    pub fn owner_uuid(&self) -> Uuid {
        match self {
            OwnerScope::Company(id) => id.as_uuid(),
            OwnerScope::Franchise(id) => id.as_uuid(),
        }
    }

    /// Rebuilds a scope from its stored `(kind, id)` pair.
    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "company" => Some(OwnerScope::Company(CompanyId::from_uuid(id))),
            "franchise" => Some(OwnerScope::Franchise(FranchiseId::from_uuid(id))),
            _ => None,
        }
    }
}

impl From<CompanyId> for OwnerScope {
    fn from(id: CompanyId) -> Self {
        OwnerScope::Company(id)
    }
}

impl From<FranchiseId> for OwnerScope {
    fn from(id: FranchiseId) -> Self {
        OwnerScope::Franchise(id)
    }
}

impl std::fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.owner_uuid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variant() {
        let company = CompanyId::new();
        let scope = OwnerScope::from(company);
        assert_eq!(scope.company_id(), Some(company));
        assert_eq!(scope.franchise_id(), None);

        let franchise = FranchiseId::new();
        let scope = OwnerScope::from(franchise);
        assert_eq!(scope.franchise_id(), Some(franchise));
        assert_eq!(scope.company_id(), None);
    }

    #[test]
    fn parts_roundtrip() {
        let scope = OwnerScope::Franchise(FranchiseId::new());
        let rebuilt = OwnerScope::from_parts(scope.kind(), scope.owner_uuid());
        assert_eq!(rebuilt, Some(scope));
        assert_eq!(OwnerScope::from_parts("warehouse", Uuid::new_v4()), None);
    }

    #[test]
    fn serialized_form_is_tagged() {
        let id = CompanyId::new();
        let json = serde_json::to_value(OwnerScope::Company(id)).unwrap();
        assert_eq!(json["kind"], "company");
        assert_eq!(json["id"], id.to_string());
    }
}
