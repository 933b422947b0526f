// # HTTP Reachability Oracle
//
// This crate asks an external check service whether an (address, port)
// answers from outside the monitored network.
//
// ## Protocol
//
// `GET <url>?server=<address>&port=<port>`; the service replies with a
// plain-text body of exactly `True` or `False`.
//
// ## Fail-closed
//
// Anything else (other body, non-200 status, timeout, transport error) is
// reported as `Reachability::Indeterminate`, which the monitor never treats as
// reachable. The client never returns an error to its caller.

use ipguard_core::GlobalConfig;
use ipguard_core::traits::{Reachability, ReachabilityOracle};
use ipguard_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const REACHABLE_TOKEN: &str = "True";
const UNREACHABLE_TOKEN: &str = "False";

/// Reachability oracle backed by an HTTP check service
#[derive(Debug, Clone)]
pub struct HttpReachabilityOracle {
    /// Check service URL
    url: String,

    /// HTTP client (timeout and proxy baked in)
    client: reqwest::Client,
}

impl HttpReachabilityOracle {
    /// Create a new oracle client
    ///
    /// # Parameters
    ///
    /// - `url`: Check service URL (e.g., "http://check.example.com/check")
    /// - `proxy`: Outbound proxy for all requests, if any
    pub fn new(url: impl Into<String>, proxy: Option<&str>) -> Result<Self> {
        Self::with_timeout(url, proxy, DEFAULT_TIMEOUT)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(
        url: impl Into<String>,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|e| Error::config(format!("Invalid check server URL '{}': {}", url, e)))?;

        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    /// Build from the `global` configuration section
    pub fn from_global(global: &GlobalConfig) -> Result<Self> {
        Self::new(global.check_server_url.clone(), global.proxy_url())
    }

    /// The configured check service URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn query(&self, address: IpAddr, port: u16) -> Reachability {
        let response = match self
            .client
            .get(&self.url)
            .query(&[("server", address.to_string()), ("port", port.to_string())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Reachability::indeterminate("check request timed out");
            }
            Err(e) => return Reachability::indeterminate(format!("check request failed: {}", e)),
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Reachability::indeterminate(format!("check server returned HTTP {}", status));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Reachability::indeterminate(format!("failed to read check response: {}", e));
            }
        };

        parse_verdict(&body)
    }
}

/// Interpret a check service body
fn parse_verdict(body: &str) -> Reachability {
    match body.trim() {
        REACHABLE_TOKEN => Reachability::Reachable,
        UNREACHABLE_TOKEN => Reachability::Unreachable,
        other => {
            let mut shown: String = other.chars().take(64).collect();
            if other.chars().count() > 64 {
                shown.push_str("...");
            }
            Reachability::indeterminate(format!("unexpected check response '{}'", shown))
        }
    }
}

#[async_trait::async_trait]
impl ReachabilityOracle for HttpReachabilityOracle {
    async fn check(&self, address: IpAddr, port: u16) -> Reachability {
        let result = self.query(address, port).await;
        match &result {
            Reachability::Indeterminate { reason } => {
                tracing::warn!("Reachability of {}:{} unknown: {}", address, port, reason);
            }
            verdict => tracing::debug!("{}:{} is {}", address, port, verdict),
        }
        result
    }
}
