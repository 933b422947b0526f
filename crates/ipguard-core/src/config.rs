//! Configuration types for ipguard
//!
//! The configuration document is a single JSON file with a `global` section
//! and an ordered list of `accounts`, each owning an ordered list of `servers`.
//!
//! ```json
//! {
//!   "global": {
//!     "round_time": 600,
//!     "check_server_url": "http://check.example.com/check",
//!     "proxy": ""
//!   },
//!   "accounts": [
//!     {
//!       "name": "oracle-account1",
//!       "oci_config_path": "~/.oci/config",
//!       "oci_profile": "DEFAULT",
//!       "servers": [
//!         { "compartment_id": "ocid1.compartment...", "instance_id": "ocid1.instance...", "vnic_id": "", "port": 443 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// Value written by the configuration wizard for fields the operator skipped
pub const PLACEHOLDER: &str = "PLACEHOLDER";

/// Main configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Process-wide settings
    pub global: GlobalConfig,

    /// Cloud accounts, monitored in order
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl MonitorConfig {
    /// Load and validate a configuration document
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration document without validating it
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Invalid configuration document: {}", e)))
    }

    /// Template document written when no configuration file exists
    pub fn template() -> Self {
        Self {
            global: GlobalConfig {
                round_time: default_round_time(),
                check_server_url: "http://your-check-server.com/check".to_string(),
                proxy: String::new(),
                history_dir: default_history_dir(),
            },
            accounts: vec![AccountConfig {
                name: "oracle-account1".to_string(),
                oci_config_path: "~/.oci/config".to_string(),
                oci_profile: "DEFAULT".to_string(),
                provider: default_provider(),
                servers: vec![ServerConfig {
                    compartment_id: PLACEHOLDER.to_string(),
                    instance_id: PLACEHOLDER.to_string(),
                    vnic_id: String::new(),
                    port: 443,
                }],
            }],
        }
    }

    /// Write this document as pretty-printed JSON
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.global.validate()?;

        if self.accounts.is_empty() {
            return Err(Error::config("No accounts configured"));
        }

        for account in &self.accounts {
            account.validate()?;
        }

        Ok(())
    }

    /// Total number of configured endpoints across all accounts
    pub fn endpoint_count(&self) -> usize {
        self.accounts.iter().map(|a| a.servers.len()).sum()
    }
}

/// Process-wide settings, read-only after startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Poll interval in seconds
    #[serde(default = "default_round_time")]
    pub round_time: u64,

    /// Reachability oracle URL
    pub check_server_url: String,

    /// Outbound proxy URL; empty disables the proxy
    #[serde(default)]
    pub proxy: String,

    /// Directory holding the per-endpoint address history files
    #[serde(default = "default_history_dir")]
    pub history_dir: String,
}

impl GlobalConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.round_time)
    }

    /// Configured proxy, if enabled
    pub fn proxy_url(&self) -> Option<&str> {
        let proxy = self.proxy.trim();
        (!proxy.is_empty()).then_some(proxy)
    }

    /// Validate the global section
    pub fn validate(&self) -> Result<()> {
        if self.round_time == 0 {
            return Err(Error::config("global.round_time must be > 0"));
        }

        let url = self.check_server_url.trim();
        if url.is_empty() {
            return Err(Error::config("global.check_server_url cannot be empty"));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::config(format!(
                "global.check_server_url must use HTTP or HTTPS scheme. Got: {}",
                url
            )));
        }

        if let Some(proxy) = self.proxy_url()
            && !proxy.contains("://")
        {
            return Err(Error::config(format!(
                "global.proxy must be a URL (e.g. http://127.0.0.1:7890). Got: {}",
                proxy
            )));
        }

        if self.history_dir.trim().is_empty() {
            return Err(Error::config("global.history_dir cannot be empty"));
        }

        Ok(())
    }
}

/// One cloud account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account name, used in logs
    pub name: String,

    /// Location of the provider credential file
    pub oci_config_path: String,

    /// Profile name inside the credential file
    #[serde(default = "default_profile")]
    pub oci_profile: String,

    /// Registered lifecycle provider to use for this account
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Endpoints monitored under this account
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl AccountConfig {
    /// Validate the account section
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("Account name cannot be empty"));
        }
        if self.oci_config_path.trim().is_empty() {
            return Err(Error::config(format!(
                "Account '{}': oci_config_path cannot be empty",
                self.name
            )));
        }
        if self.provider.trim().is_empty() {
            return Err(Error::config(format!(
                "Account '{}': provider cannot be empty",
                self.name
            )));
        }

        for server in &self.servers {
            server.validate(&self.name)?;
        }

        Ok(())
    }

    /// Endpoints described by this account, in configuration order
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.servers
            .iter()
            .map(|server| server.to_endpoint(&self.name))
            .collect()
    }
}

/// One monitored compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Compartment holding the instance and its addresses
    pub compartment_id: String,

    /// Instance identifier
    pub instance_id: String,

    /// Primary network interface; empty means resolve automatically
    #[serde(default)]
    pub vnic_id: String,

    /// Port checked by the reachability oracle
    pub port: u16,
}

impl ServerConfig {
    fn validate(&self, account: &str) -> Result<()> {
        for (field, value) in [
            ("compartment_id", &self.compartment_id),
            ("instance_id", &self.instance_id),
        ] {
            let value = value.trim();
            if value.is_empty() || value == PLACEHOLDER {
                return Err(Error::config(format!(
                    "Account '{}': server {} must be set",
                    account, field
                )));
            }
        }

        if self.vnic_id.trim() == PLACEHOLDER {
            return Err(Error::config(format!(
                "Account '{}': server vnic_id is a placeholder; leave it empty to resolve automatically",
                account
            )));
        }

        if self.port == 0 {
            return Err(Error::config(format!(
                "Account '{}': server {} has port 0",
                account, self.instance_id
            )));
        }

        Ok(())
    }

    /// Build the endpoint identity for this server
    pub fn to_endpoint(&self, account: &str) -> Endpoint {
        let vnic = self.vnic_id.trim();
        Endpoint {
            account: account.to_string(),
            compartment_id: self.compartment_id.trim().to_string(),
            instance_id: self.instance_id.trim().to_string(),
            interface_id: (!vnic.is_empty()).then(|| vnic.to_string()),
            port: self.port,
        }
    }
}

fn default_round_time() -> u64 {
    600
}

fn default_history_dir() -> String {
    ".".to_string()
}

fn default_profile() -> String {
    "DEFAULT".to_string()
}

fn default_provider() -> String {
    "oci".to_string()
}
