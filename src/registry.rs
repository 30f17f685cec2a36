use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::provider::{Provider, ProviderManifest};

/// A deferred provider construction. The builder runs during registry load;
/// any error it returns is isolated to this provider.
pub struct ProviderSpec {
    name: String,
    build: Box<dyn FnOnce() -> Result<Provider, String> + Send>,
}

impl ProviderSpec {
    pub fn new(
        name: impl Into<String>,
        build: impl FnOnce() -> Result<Provider, String> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            build: Box::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A provider that could not be loaded, and why. Absence from the registry
/// plus one of these is the only trace a broken provider leaves.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider `{provider}` failed to load: {reason}")]
pub struct LoadError {
    pub provider: String,
    pub reason: String,
}

/// The set of providers that loaded successfully, keyed by name. Built once
/// at startup and read-only afterwards; presence of a name is the sole
/// signal of availability; there are no half-initialized entries.
pub struct Registry {
    providers: BTreeMap<String, Arc<Provider>>,
}

impl Registry {
    /// Attempt to construct every spec. A failure loading one provider is
    /// recorded and logged, never propagated; the rest of the load
    /// continues. A name collision rejects the later spec.
    pub fn load(specs: Vec<ProviderSpec>) -> (Self, Vec<LoadError>) {
        let mut providers = BTreeMap::new();
        let mut errors = Vec::new();

        for spec in specs {
            let ProviderSpec { name, build } = spec;
            match build() {
                Ok(provider) => {
                    if providers.contains_key(provider.name()) {
                        warn!(provider = %provider.name(), "duplicate provider name, keeping first");
                        errors.push(LoadError {
                            provider: provider.name().to_string(),
                            reason: "a provider with this name is already registered".into(),
                        });
                        continue;
                    }
                    info!(provider = %provider.name(), tools = provider.tools().len(), "provider loaded");
                    providers.insert(provider.name().to_string(), Arc::new(provider));
                }
                Err(reason) => {
                    warn!(provider = %name, %reason, "provider failed to load, skipping");
                    errors.push(LoadError {
                        provider: name,
                        reason,
                    });
                }
            }
        }

        (Self { providers }, errors)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.providers.values()
    }

    /// Manifests for every loaded provider: the contract handed to the
    /// external planner.
    pub fn manifests(&self) -> Vec<ProviderManifest> {
        self.providers.values().map(|p| p.manifest()).collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.names())
            .finish()
    }
}
