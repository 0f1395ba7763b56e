//! Tenancy collaborator trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{CompanyId, FranchiseId};
use thiserror::Error;

/// Failure of the tenancy collaborator itself.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TenancyError(pub String);

/// Resolves which company a franchise belongs to.
#[async_trait]
pub trait TenancyDirectory: Send + Sync {
    /// Returns the owning company, or `None` for an unknown franchise.
    async fn company_of(&self, franchise_id: FranchiseId) -> Result<Option<CompanyId>, TenancyError>;

    /// Returns true if `franchise_id` is one of `company_id`'s franchises.
    async fn belongs_to(
        &self,
        franchise_id: FranchiseId,
        company_id: CompanyId,
    ) -> Result<bool, TenancyError> {
        Ok(self.company_of(franchise_id).await? == Some(company_id))
    }
}

#[derive(Debug, Default)]
struct InMemoryTenancyState {
    franchises: HashMap<FranchiseId, CompanyId>,
    unavailable: bool,
}

/// In-memory tenancy directory for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTenancyDirectory {
    state: Arc<RwLock<InMemoryTenancyState>>,
}

impl InMemoryTenancyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a franchise under a company.
    pub fn register(&self, company_id: CompanyId, franchise_id: FranchiseId) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .franchises
            .insert(franchise_id, company_id);
    }

    /// Makes every lookup fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }
}

#[async_trait]
impl TenancyDirectory for InMemoryTenancyDirectory {
    async fn company_of(&self, franchise_id: FranchiseId) -> Result<Option<CompanyId>, TenancyError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.unavailable {
            return Err(TenancyError("tenancy directory unavailable".to_string()));
        }
        Ok(state.franchises.get(&franchise_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_registered_franchises() {
        let directory = InMemoryTenancyDirectory::new();
        let company = CompanyId::new();
        let franchise = FranchiseId::new();
        directory.register(company, franchise);

        assert_eq!(directory.company_of(franchise).await.unwrap(), Some(company));
        assert!(directory.belongs_to(franchise, company).await.unwrap());
        assert!(!directory.belongs_to(franchise, CompanyId::new()).await.unwrap());
        assert_eq!(directory.company_of(FranchiseId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unavailable_directory_fails() {
        let directory = InMemoryTenancyDirectory::new();
        directory.set_unavailable(true);
        assert!(directory.company_of(FranchiseId::new()).await.is_err());
    }
}
