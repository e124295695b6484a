//! In-memory adapter for engine tests.

use crate::core::types::{ActionOutcome, Backend, InstalledPackages};
use crate::core::{CancelToken, version};
use crate::error::{PkgtrailError, Result};
use crate::packages::traits::{
    DETAIL_BACKEND_UNAVAILABLE, DETAIL_CANCELLED, PackageManager, Presence,
};
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct FakeManager {
    backend: Backend,
    available: bool,
    installed: Mutex<InstalledPackages>,
    broken: BTreeSet<String>,
    cancel_on: Option<(String, CancelToken)>,
    mutations: AtomicUsize,
}

impl FakeManager {
    pub fn new(backend: &str) -> Self {
        Self {
            backend: Backend::from(backend),
            available: true,
            installed: Mutex::new(InstalledPackages::new()),
            broken: BTreeSet::new(),
            cancel_on: None,
            mutations: AtomicUsize::new(0),
        }
    }

    pub fn with_package(self, name: &str, version: &str) -> Self {
        self.installed
            .lock()
            .unwrap()
            .insert(name.to_string(), Some(version.to_string()));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Installing or removing `name` fails natively.
    pub fn broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    /// Simulates Ctrl-C arriving while `name` is being installed.
    pub fn cancel_on(mut self, name: &str, token: CancelToken) -> Self {
        self.cancel_on = Some((name.to_string(), token));
        self
    }

    /// Number of native install/remove commands actually run.
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn installed(&self) -> InstalledPackages {
        self.installed.lock().unwrap().clone()
    }

    fn interrupted(&self, name: &str) -> bool {
        match &self.cancel_on {
            Some((target, token)) if target == name => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

impl PackageManager for FakeManager {
    fn backend(&self) -> Backend {
        self.backend.clone()
    }

    fn detect(&self) -> bool {
        self.available
    }

    fn list_installed(&self) -> Result<InstalledPackages> {
        if !self.available {
            return Err(PkgtrailError::BackendUnavailable(self.backend.to_string()));
        }
        Ok(self.installed())
    }

    fn install(&self, name: &str, requested: Option<&str>) -> ActionOutcome {
        if !self.available {
            return ActionOutcome::failed(DETAIL_BACKEND_UNAVAILABLE);
        }
        let mut installed = self.installed.lock().unwrap();
        if let Some(current) = installed.get(name)
            && version::satisfies_request(current.as_deref(), requested)
        {
            return ActionOutcome::skipped(current.clone(), "already installed");
        }
        if self.interrupted(name) {
            return ActionOutcome::failed(DETAIL_CANCELLED);
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(name) {
            return ActionOutcome::failed(format!("exit code 100: E: Unable to locate package {}", name));
        }
        let resolved = requested.unwrap_or("1.0").to_string();
        installed.insert(name.to_string(), Some(resolved.clone()));
        ActionOutcome::success(Some(resolved))
    }

    fn remove(&self, name: &str) -> ActionOutcome {
        if !self.available {
            return ActionOutcome::failed(DETAIL_BACKEND_UNAVAILABLE);
        }
        let mut installed = self.installed.lock().unwrap();
        if !installed.contains_key(name) {
            return ActionOutcome::skipped(None, "not installed");
        }
        if self.interrupted(name) {
            return ActionOutcome::failed(DETAIL_CANCELLED);
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(name) {
            return ActionOutcome::failed("exit code 1: removal refused");
        }
        installed.remove(name);
        ActionOutcome::success(None)
    }

    fn query(&self, name: &str) -> Result<Presence> {
        Ok(match self.list_installed()?.get(name) {
            Some(version) => Presence::Installed {
                version: version.clone(),
            },
            None => Presence::Absent,
        })
    }

    fn install_command_preview(&self, name: &str, version: Option<&str>) -> Option<String> {
        Some(match version {
            Some(v) => format!("{} install {}={}", self.backend, name, v),
            None => format!("{} install {}", self.backend, name),
        })
    }
}
