//! Test doubles and common utilities for monitor contract tests
//!
//! These doubles script the cloud control plane and the reachability oracle
//! so tests can drive the monitor deterministically.

#![allow(dead_code)]

use async_trait::async_trait;
use ipguard_core::config::{AccountConfig, GlobalConfig, MonitorConfig, ServerConfig};
use ipguard_core::error::{Error, Result};
use ipguard_core::traits::{
    AddressLifecycleProvider, AddressProviderFactory, AddressScope, Reachability,
    ReachabilityOracle, SettleDelays,
};
use ipguard_core::Endpoint;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// One call observed by [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Resolve(String),
    Fetch(String),
    Release(IpAddr),
    Allocate(String),
}

#[derive(Default)]
struct ProviderState {
    /// instance id -> attached interface
    interfaces: HashMap<String, String>,
    /// interface -> public address
    addresses: HashMap<String, IpAddr>,
    /// addresses handed out by allocate, in order
    pool: VecDeque<IpAddr>,
    fail_fetch: bool,
    fail_allocate: bool,
    fail_release: bool,
    release_reports_not_found: bool,
    calls: Vec<(ProviderCall, tokio::time::Instant)>,
}

/// Scripted lifecycle provider; clones share state
#[derive(Clone)]
pub struct MockProvider {
    state: Arc<Mutex<ProviderState>>,
    delays: SettleDelays,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState::default())),
            delays: SettleDelays::NONE,
        }
    }

    pub fn with_interface(self, instance_id: &str, interface_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .interfaces
            .insert(instance_id.to_string(), interface_id.to_string());
        self
    }

    pub fn with_address(self, interface_id: &str, address: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .addresses
            .insert(interface_id.to_string(), ip(address));
        self
    }

    pub fn with_pool(self, addresses: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .pool
            .extend(addresses.iter().map(|a| ip(a)));
        self
    }

    pub fn with_settle_delays(mut self, after_release: Duration, after_allocate: Duration) -> Self {
        self.delays = SettleDelays {
            after_release,
            after_allocate,
        };
        self
    }

    pub fn failing_fetch(self) -> Self {
        self.state.lock().unwrap().fail_fetch = true;
        self
    }

    pub fn failing_allocation(self) -> Self {
        self.state.lock().unwrap().fail_allocate = true;
        self
    }

    pub fn failing_release(self) -> Self {
        self.state.lock().unwrap().fail_release = true;
        self
    }

    pub fn release_reports_not_found(self) -> Self {
        self.state.lock().unwrap().release_reports_not_found = true;
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    /// Instants at which matching calls were made
    pub fn call_times(&self, matches: impl Fn(&ProviderCall) -> bool) -> Vec<tokio::time::Instant> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(call, _)| matches(call))
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn allocate_count(&self) -> usize {
        self.call_times(|c| matches!(c, ProviderCall::Allocate(_))).len()
    }

    pub fn resolve_count(&self) -> usize {
        self.call_times(|c| matches!(c, ProviderCall::Resolve(_))).len()
    }

    pub fn current_address(&self, interface_id: &str) -> Option<IpAddr> {
        self.state.lock().unwrap().addresses.get(interface_id).copied()
    }

    fn log(&self, call: ProviderCall) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push((call, tokio::time::Instant::now()));
    }
}

#[async_trait]
impl AddressLifecycleProvider for MockProvider {
    async fn resolve_primary_interface(&self, endpoint: &Endpoint) -> Result<String> {
        self.log(ProviderCall::Resolve(endpoint.instance_id.clone()));
        self.state
            .lock()
            .unwrap()
            .interfaces
            .get(&endpoint.instance_id)
            .cloned()
            .ok_or_else(|| Error::interface(format!("no attached VNIC for {}", endpoint.instance_id)))
    }

    async fn get_public_address(&self, interface_id: &str) -> Result<Option<IpAddr>> {
        self.log(ProviderCall::Fetch(interface_id.to_string()));
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(Error::provider("mock", "fetch failed"));
        }
        Ok(state.addresses.get(interface_id).copied())
    }

    async fn release_address(&self, address: IpAddr, scope: &AddressScope) -> Result<()> {
        self.log(ProviderCall::Release(address));
        let mut state = self.state.lock().unwrap();
        if state.fail_release {
            return Err(Error::provider("mock", "release failed"));
        }
        state.addresses.remove(&scope.interface_id);
        if state.release_reports_not_found {
            return Err(Error::not_found(format!("public IP {} not found", address)));
        }
        Ok(())
    }

    async fn allocate_ephemeral_address(&self, scope: &AddressScope) -> Result<IpAddr> {
        self.log(ProviderCall::Allocate(scope.interface_id.clone()));
        let mut state = self.state.lock().unwrap();
        if state.fail_allocate {
            return Err(Error::provider("mock", "out of capacity"));
        }
        let address = state
            .pool
            .pop_front()
            .ok_or_else(|| Error::provider("mock", "address pool exhausted"))?;
        state.addresses.insert(scope.interface_id.clone(), address);
        Ok(address)
    }

    fn settle_delays(&self) -> SettleDelays {
        self.delays
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Scripted oracle: reachable unless listed; clones share state
#[derive(Clone, Default)]
pub struct MockOracle {
    unreachable: Arc<Mutex<HashSet<IpAddr>>>,
    indeterminate: Arc<Mutex<HashSet<IpAddr>>>,
    checks: Arc<Mutex<Vec<(IpAddr, u16)>>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(self, addresses: &[&str]) -> Self {
        self.unreachable
            .lock()
            .unwrap()
            .extend(addresses.iter().map(|a| ip(a)));
        self
    }

    pub fn indeterminate(self, addresses: &[&str]) -> Self {
        self.indeterminate
            .lock()
            .unwrap()
            .extend(addresses.iter().map(|a| ip(a)));
        self
    }

    pub fn checks(&self) -> Vec<(IpAddr, u16)> {
        self.checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReachabilityOracle for MockOracle {
    async fn check(&self, address: IpAddr, port: u16) -> Reachability {
        self.checks.lock().unwrap().push((address, port));
        if self.indeterminate.lock().unwrap().contains(&address) {
            Reachability::indeterminate("HTTP 502")
        } else if self.unreachable.lock().unwrap().contains(&address) {
            Reachability::Unreachable
        } else {
            Reachability::Reachable
        }
    }
}

/// Factory handing out pre-built providers by account name
#[derive(Clone, Default)]
pub struct MockProviderFactory {
    providers: HashMap<String, MockProvider>,
}

impl MockProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: &str, provider: MockProvider) -> Self {
        self.providers.insert(account.to_string(), provider);
        self
    }
}

impl AddressProviderFactory for MockProviderFactory {
    fn create(
        &self,
        account: &AccountConfig,
        _global: &GlobalConfig,
    ) -> Result<Arc<dyn AddressLifecycleProvider>> {
        let provider = self
            .providers
            .get(&account.name)
            .cloned()
            .ok_or_else(|| Error::auth(format!("profile {} rejected", account.oci_profile)))?;
        Ok(Arc::new(provider))
    }
}

pub fn endpoint(instance_id: &str) -> Endpoint {
    Endpoint::new("acct", "ocid1.compartment.oc1..test", instance_id, 443)
}

pub fn server(instance_id: &str, vnic_id: &str) -> ServerConfig {
    ServerConfig {
        compartment_id: "ocid1.compartment.oc1..test".to_string(),
        instance_id: instance_id.to_string(),
        vnic_id: vnic_id.to_string(),
        port: 443,
    }
}

pub fn account(name: &str, servers: Vec<ServerConfig>) -> AccountConfig {
    AccountConfig {
        name: name.to_string(),
        oci_config_path: "~/.oci/config".to_string(),
        oci_profile: "DEFAULT".to_string(),
        provider: "mock".to_string(),
        servers,
    }
}

pub fn config(round_time: u64, accounts: Vec<AccountConfig>) -> MonitorConfig {
    MonitorConfig {
        global: GlobalConfig {
            round_time,
            check_server_url: "http://check.example.com/check".to_string(),
            proxy: String::new(),
            history_dir: ".".to_string(),
        },
        accounts,
    }
}
