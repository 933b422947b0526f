// # Address Lifecycle Provider Trait
//
// Defines the interface over a cloud network control plane: reading an
// instance's public address, releasing it, and allocating a new ephemeral one.
//
// ## Implementations
//
// - Oracle Cloud Infrastructure: `ipguard-provider-oci` crate
//
// ## Usage
//
// ```rust,ignore
// use ipguard_core::AddressLifecycleProvider;
//
// async fn show(provider: &dyn AddressLifecycleProvider, endpoint: &Endpoint) -> ipguard_core::Result<()> {
//     let interface_id = provider.resolve_primary_interface(endpoint).await?;
//     match provider.get_public_address(&interface_id).await? {
//         Some(ip) => println!("{} is at {}", endpoint, ip),
//         None => println!("{} has no public address", endpoint),
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::Endpoint;

/// Reference wait after releasing an address
pub const DEFAULT_SETTLE_AFTER_RELEASE: Duration = Duration::from_secs(10);

/// Reference wait after allocating an address
pub const DEFAULT_SETTLE_AFTER_ALLOCATE: Duration = Duration::from_secs(15);

/// Waits a provider requires after each mutation before reads are consistent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    /// Wait after `release_address`
    pub after_release: Duration,
    /// Wait after `allocate_ephemeral_address`
    pub after_allocate: Duration,
}

impl SettleDelays {
    /// No waiting at all (in-memory and test providers)
    pub const NONE: SettleDelays = SettleDelays {
        after_release: Duration::ZERO,
        after_allocate: Duration::ZERO,
    };
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            after_release: DEFAULT_SETTLE_AFTER_RELEASE,
            after_allocate: DEFAULT_SETTLE_AFTER_ALLOCATE,
        }
    }
}

/// Where a release or allocation happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressScope {
    /// Compartment owning the address object
    pub compartment_id: String,
    /// Interface the address is (or will be) bound to
    pub interface_id: String,
}

impl AddressScope {
    pub fn new(compartment_id: impl Into<String>, interface_id: impl Into<String>) -> Self {
        Self {
            compartment_id: compartment_id.into(),
            interface_id: interface_id.into(),
        }
    }
}

/// Trait for address lifecycle provider implementations
///
/// Every operation is a single-shot call against the control plane and may
/// fail independently. Providers hold no per-endpoint state, so one instance
/// per account is shared by all of that account's monitors.
///
/// # Provider Contract
///
/// ## Allowed
/// - ✅ Perform authenticated API calls to their control plane
/// - ✅ Map provider status codes onto [`crate::Error`] variants
///
/// ## Forbidden
/// - ❌ Retry or back off (the monitor's poll interval is the backoff)
/// - ❌ Sleep for consistency (declare it through [`settle_delays`](Self::settle_delays))
/// - ❌ Touch the history store or call the reachability oracle
#[async_trait]
pub trait AddressLifecycleProvider: Send + Sync {
    /// Find the interface attachment of `endpoint` that is currently attached
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The interface identifier
    /// - `Err(Error)`: No attached interface, or the request failed
    async fn resolve_primary_interface(&self, endpoint: &Endpoint) -> Result<String, crate::Error>;

    /// Current public address of an interface
    ///
    /// # Returns
    ///
    /// - `Ok(Some(IpAddr))`: The assigned address
    /// - `Ok(None)`: No public address is assigned
    /// - `Err(Error)`: The request failed
    async fn get_public_address(&self, interface_id: &str) -> Result<Option<IpAddr>, crate::Error>;

    /// Release a public address
    ///
    /// Must succeed when the address is already gone.
    async fn release_address(&self, address: IpAddr, scope: &AddressScope) -> Result<(), crate::Error>;

    /// Allocate a new ephemeral public address on the scope's interface
    async fn allocate_ephemeral_address(&self, scope: &AddressScope) -> Result<IpAddr, crate::Error>;

    /// Consistency waits the monitor applies after mutations
    fn settle_delays(&self) -> SettleDelays {
        SettleDelays::default()
    }

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing lifecycle providers from account configuration
pub trait AddressProviderFactory: Send + Sync {
    /// Create a provider for one account
    ///
    /// # Parameters
    ///
    /// - `account`: The account section (credential file, profile)
    /// - `global`: Process-wide settings (proxy)
    fn create(
        &self,
        account: &crate::config::AccountConfig,
        global: &crate::config::GlobalConfig,
    ) -> Result<Arc<dyn AddressLifecycleProvider>, crate::Error>;
}
