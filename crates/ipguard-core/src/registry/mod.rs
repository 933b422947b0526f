//! Plugin-based provider registry
//!
//! Lifecycle providers register a factory under a name; each account's
//! `provider` field selects the factory used to build that account's client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ipguard_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! ipguard_provider_oci::register(&registry);
//!
//! let provider = registry.create_provider(&account, &config.global)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::{AccountConfig, GlobalConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressLifecycleProvider, AddressProviderFactory};

/// Registry of lifecycle provider factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn AddressProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lifecycle provider factory
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn AddressProviderFactory>,
    ) {
        let name = name.into();
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.insert(name, factory);
    }

    /// Build the provider for one account
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn AddressLifecycleProvider>)`: Provider shared by the account's monitors
    /// - `Err(Error)`: Unknown provider name or the factory failed (bad credentials)
    pub fn create_provider(
        &self,
        account: &AccountConfig,
        global: &GlobalConfig,
    ) -> Result<Arc<dyn AddressLifecycleProvider>> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());

        let factory = providers.get(&account.provider).ok_or_else(|| {
            Error::config(format!(
                "Unknown provider type '{}' for account '{}'",
                account.provider, account.name
            ))
        })?;

        factory.create(account, global)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        providers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::traits::AddressScope;
    use async_trait::async_trait;
    use std::net::IpAddr;

    struct NullProvider;

    #[async_trait]
    impl AddressLifecycleProvider for NullProvider {
        async fn resolve_primary_interface(&self, _endpoint: &Endpoint) -> Result<String> {
            Err(Error::interface("none"))
        }

        async fn get_public_address(&self, _interface_id: &str) -> Result<Option<IpAddr>> {
            Ok(None)
        }

        async fn release_address(&self, _address: IpAddr, _scope: &AddressScope) -> Result<()> {
            Ok(())
        }

        async fn allocate_ephemeral_address(&self, _scope: &AddressScope) -> Result<IpAddr> {
            Err(Error::provider("null", "cannot allocate"))
        }

        fn provider_name(&self) -> &'static str {
            "null"
        }
    }

    struct NullFactory;

    impl AddressProviderFactory for NullFactory {
        fn create(
            &self,
            account: &AccountConfig,
            _global: &GlobalConfig,
        ) -> Result<Arc<dyn AddressLifecycleProvider>> {
            if account.oci_config_path == "missing" {
                return Err(Error::config("credential file missing"));
            }
            Ok(Arc::new(NullProvider))
        }
    }

    fn account(provider: &str, path: &str) -> AccountConfig {
        AccountConfig {
            name: "acct".to_string(),
            oci_config_path: path.to_string(),
            oci_profile: "DEFAULT".to_string(),
            provider: provider.to_string(),
            servers: Vec::new(),
        }
    }

    #[test]
    fn creates_registered_provider() {
        let registry = ProviderRegistry::new();
        registry.register_provider("null", Box::new(NullFactory));
        let global = crate::config::MonitorConfig::template().global;

        let provider = registry
            .create_provider(&account("null", "~/.oci/config"), &global)
            .unwrap();
        assert_eq!(provider.provider_name(), "null");
        assert!(registry.has_provider("null"));
        assert_eq!(registry.list_providers(), vec!["null".to_string()]);
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let global = crate::config::MonitorConfig::template().global;

        let err = registry
            .create_provider(&account("aws", "~/.aws"), &global)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn factory_errors_propagate() {
        let registry = ProviderRegistry::new();
        registry.register_provider("null", Box::new(NullFactory));
        let global = crate::config::MonitorConfig::template().global;

        assert!(registry
            .create_provider(&account("null", "missing"), &global)
            .is_err());
    }
}
