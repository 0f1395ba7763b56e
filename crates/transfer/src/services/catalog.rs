//! Catalog service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{Money, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::TransferError;

/// What the catalog knows about a product variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub variant_id: VariantId,
    pub name: String,
    pub sku: String,
    pub retail_price: Money,
}

impl CatalogEntry {
    pub fn new(
        variant_id: VariantId,
        name: impl Into<String>,
        sku: impl Into<String>,
        retail_price: Money,
    ) -> Self {
        Self {
            variant_id,
            name: name.into(),
            sku: sku.into(),
            retail_price,
        }
    }
}

/// Trait for resolving variants to catalog data.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Looks up one variant. `None` means the variant does not exist.
    async fn lookup(&self, variant_id: VariantId) -> Result<Option<CatalogEntry>, TransferError>;

    /// Looks up several variants; unknown ones are absent from the map.
    async fn lookup_many(
        &self,
        variant_ids: &[VariantId],
    ) -> Result<HashMap<VariantId, CatalogEntry>, TransferError> {
        let mut found = HashMap::with_capacity(variant_ids.len());
        for &variant_id in variant_ids {
            if let Some(entry) = self.lookup(variant_id).await? {
                found.insert(variant_id, entry);
            }
        }
        Ok(found)
    }
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    entries: HashMap<VariantId, CatalogEntry>,
    fail_on_lookup: bool,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: CatalogEntry) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .insert(entry.variant_id, entry);
    }

    /// Registers a variant under a generated name and returns its id.
    pub fn add_variant(&self, name: &str, retail_price: Money) -> VariantId {
        let variant_id = VariantId::new();
        let sku = format!("SKU-{}", name.to_ascii_uppercase().replace(' ', "-"));
        self.insert(CatalogEntry::new(variant_id, name, sku, retail_price));
        variant_id
    }

    /// Configures the service to fail every lookup.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_lookup = fail;
    }

    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .keys()
            .copied()
            .collect()
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn lookup(&self, variant_id: VariantId) -> Result<Option<CatalogEntry>, TransferError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_lookup {
            return Err(TransferError::CatalogService(
                "catalog unavailable".to_string(),
            ));
        }
        Ok(state.entries.get(&variant_id).cloned())
    }
}
