//! Adapter registry keyed by data-store kind.
//!
//! Registration takes the write lock; lookups share the read lock and hand
//! out `Arc` clones, so readers never hold the lock while using an adapter.

use super::adapter::DataStoreAdapter;
use super::adapters::builtin_adapter;
use super::DataStoreKind;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("data-store kind '{kind}' is not registered{}", suggestion_hint(.suggestion))]
    KindNotFound {
        kind: String,
        suggestion: Option<String>,
    },

    #[error("data-store kind '{0}' is already registered")]
    DuplicateKind(DataStoreKind),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{}'?)", s))
        .unwrap_or_default()
}

pub struct AdapterRegistry {
    adapters: RwLock<HashMap<DataStoreKind, Arc<dyn DataStoreAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        let registry = Self::new();
        {
            let mut adapters = registry.write();
            for kind in DataStoreKind::builtin_variants() {
                if let Some(adapter) = builtin_adapter(kind) {
                    adapters.insert(kind.clone(), adapter);
                }
            }
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<DataStoreKind, Arc<dyn DataStoreAdapter>>> {
        self.adapters.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DataStoreKind, Arc<dyn DataStoreAdapter>>> {
        self.adapters.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds an adapter. Existing entries are left untouched on conflict.
    pub fn register(&self, adapter: Arc<dyn DataStoreAdapter>) -> Result<(), RegistryError> {
        let kind = adapter.kind();
        let mut adapters = self.write();
        if adapters.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        info!(kind = %kind, port = adapter.default_port(), "Registered data-store adapter");
        adapters.insert(kind, adapter);
        Ok(())
    }

    pub fn get(&self, kind: &DataStoreKind) -> Result<Arc<dyn DataStoreAdapter>, RegistryError> {
        if let Some(adapter) = self.read().get(kind) {
            return Ok(Arc::clone(adapter));
        }

        let suggestion = self.suggest(kind.as_str());
        debug!(kind = %kind, suggestion = ?suggestion, "Adapter lookup failed");
        Err(RegistryError::KindNotFound {
            kind: kind.to_string(),
            suggestion,
        })
    }

    /// Looks up by name or alias, e.g. `"postgres"`.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn DataStoreAdapter>, RegistryError> {
        self.get(&DataStoreKind::parse(name))
    }

    pub fn contains(&self, kind: &DataStoreKind) -> bool {
        self.read().contains_key(kind)
    }

    /// Registered kinds, sorted by name.
    pub fn kinds(&self) -> Vec<DataStoreKind> {
        let mut kinds: Vec<_> = self.read().keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    /// Registered adapters, sorted by kind name.
    pub fn adapters(&self) -> Vec<Arc<dyn DataStoreAdapter>> {
        let adapters = self.read();
        let mut list: Vec<_> = adapters.values().cloned().collect();
        list.sort_by(|a, b| a.kind().as_str().cmp(b.kind().as_str()));
        list
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn suggest(&self, name: &str) -> Option<String> {
        self.read()
            .keys()
            .map(|k| (k.as_str().to_string(), strsim::jaro_winkler(name, k.as_str())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(name, _)| name)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
