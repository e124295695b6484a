//! # Package Manager Registry
//!
//! Maps backend names to adapters. New package managers are added by
//! registering an adapter; nothing else dispatches on the backend name.
//!
//! The registry also owns the per-backend mutation locks: at most one
//! install/remove runs against a given backend at a time, while read-only
//! queries for different backends run in parallel.

use crate::backends::{BackendConfig, GenericManager};
use crate::core::ExecContext;
use crate::core::types::{Backend, sort_by_precedence};
use crate::error::{PkgtrailError, Result};
use crate::packages::PackageManager;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct Registered {
    manager: Arc<dyn PackageManager>,
    mutation_lock: Mutex<()>,
}

#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<Backend, Registered>,
    precedence: Vec<Backend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `GenericManager` per config, all sharing `ctx`
    pub fn from_configs(configs: BTreeMap<String, BackendConfig>, ctx: &ExecContext) -> Self {
        let mut registry = Self::new();
        for config in configs.into_values() {
            registry.register(Arc::new(GenericManager::from_config(config, ctx.clone())));
        }
        registry
    }

    /// Register an adapter under its own backend name, replacing any
    /// previous adapter for that name.
    pub fn register(&mut self, manager: Arc<dyn PackageManager>) {
        self.backends.insert(
            manager.backend(),
            Registered {
                manager,
                mutation_lock: Mutex::new(()),
            },
        );
    }

    pub fn get(&self, backend: &Backend) -> Option<Arc<dyn PackageManager>> {
        self.backends.get(backend).map(|r| Arc::clone(&r.manager))
    }

    pub fn has_backend(&self, backend: &Backend) -> bool {
        self.backends.contains_key(backend)
    }

    /// Registered backends in precedence order
    pub fn backends(&self) -> Vec<Backend> {
        self.ordered(self.backends.keys().cloned())
    }

    /// Hold the returned guard for the whole install/remove.
    pub fn lock_mutations(&self, backend: &Backend) -> Result<MutexGuard<'_, ()>> {
        let registered = self
            .backends
            .get(backend)
            .ok_or_else(|| PkgtrailError::BackendUnavailable(backend.to_string()))?;

        registered.mutation_lock.lock().map_err(|_| {
            PkgtrailError::LockError(format!("mutation lock for '{}' is poisoned", backend))
        })
    }

    pub fn set_precedence(&mut self, precedence: Vec<Backend>) {
        self.precedence = precedence;
    }

    pub fn precedence(&self) -> &[Backend] {
        &self.precedence
    }

    /// Backends listed in the precedence order come first, in that order;
    /// the rest follow alphabetically.
    pub fn ordered(&self, backends: impl IntoIterator<Item = Backend>) -> Vec<Backend> {
        let mut backends: Vec<Backend> = backends.into_iter().collect();
        sort_by_precedence(&mut backends, &self.precedence);
        backends
    }

    /// Run `detect` for every backend in parallel
    pub fn detect_available(&self) -> BTreeMap<Backend, bool> {
        self.backends
            .par_iter()
            .map(|(backend, registered)| (backend.clone(), registered.manager.detect()))
            .collect()
    }
}
