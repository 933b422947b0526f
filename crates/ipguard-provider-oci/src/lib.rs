// # OCI Address Lifecycle Provider
//
// This crate manages the public address of Oracle Cloud compute instances
// through the OCI Core Services REST API (version 20160918).
//
// ## Behaviour
//
// - One HTTP request per API call; no retries, no background tasks. The
//   monitor's poll interval is the only retry policy.
// - Every request is signed with the account's API key (see `signer`).
// - Releasing an address that no longer exists is success.
// - Releasing a RESERVED address is refused: only ephemeral addresses are
//   ever deleted.
//
// ## Security
//
// - The private key and key fingerprint never appear in logs or `Debug`
//   output.
//
// ## API Reference
//
// - List VNIC attachments: GET `/vnicAttachments?compartmentId=...&instanceId=...`
// - Get VNIC: GET `/vnics/:vnic_id`
// - List private IPs: GET `/privateIps?vnicId=...`
// - Find public IP: POST `/publicIps/actions/getByIpAddress`
// - Delete public IP: DELETE `/publicIps/:public_ip_id`
// - Create public IP: POST `/publicIps`

pub mod config;
pub mod models;
pub mod signer;

use async_trait::async_trait;
use ipguard_core::config::{AccountConfig, GlobalConfig};
use ipguard_core::traits::{
    AddressLifecycleProvider, AddressProviderFactory, AddressScope, SettleDelays,
};
use ipguard_core::{Endpoint, Error, ProviderRegistry, Result};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

pub use config::OciProfile;
pub use signer::RequestSigner;

use models::{
    ApiError, CreatePublicIpDetails, GetPublicIpByIpAddressDetails, LIFECYCLE_ATTACHED,
    LIFETIME_EPHEMERAL, LIFETIME_RESERVED, PrivateIp, PublicIp, Vnic, VnicAttachment,
};

/// Core Services API version path
const API_VERSION: &str = "20160918";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "oci";

/// Core Services endpoint for a region
pub fn regional_endpoint(region: &str) -> String {
    format!("https://iaas.{}.oraclecloud.com/{}", region, API_VERSION)
}

/// OCI address lifecycle provider
///
/// One instance per account, shared by all of that account's monitors.
pub struct OciProvider {
    /// API base including the version segment
    base_url: String,

    /// Request signer
    /// ⚠️ Holds the private key
    signer: RequestSigner,

    /// HTTP client for API requests
    client: reqwest::Client,

    settle: SettleDelays,
}

// Custom Debug implementation that hides the signing key
impl std::fmt::Debug for OciProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciProvider")
            .field("base_url", &self.base_url)
            .field("signer", &"<REDACTED>")
            .field("settle", &self.settle)
            .finish()
    }
}

impl OciProvider {
    /// Create a provider for `profile`'s region
    ///
    /// # Parameters
    ///
    /// - `profile`: Credentials and region
    /// - `private_key_pem`: Unencrypted API signing key
    /// - `proxy`: Outbound proxy for all API calls, if any
    pub fn new(profile: &OciProfile, private_key_pem: &str, proxy: Option<&str>) -> Result<Self> {
        let signer = RequestSigner::from_pem(profile.key_id(), private_key_pem)?;

        let mut builder = reqwest::Client::builder().timeout(DEFAULT_HTTP_TIMEOUT);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: regional_endpoint(&profile.region),
            signer,
            client,
            settle: SettleDelays::default(),
        })
    }

    /// Point the provider at another API base (e.g. a realm-specific domain)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the waits around release and allocation
    pub fn with_settle_delays(mut self, settle: SettleDelays) -> Self {
        self.settle = settle;
        self
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::config(format!("Invalid OCI API URL: {}", e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sign and send one request; non-2xx statuses become typed errors
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        context: &str,
    ) -> Result<reqwest::Response> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let headers = self.signer.sign(&method, &url, body.as_deref(), &date)?;

        tracing::debug!("OCI {} {}", method, url.path());

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        Err(status_error(status, &error_text, context))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T> {
        let response = self.send(Method::GET, url, None, context).await?;
        parse_json(response, context).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
        context: &str,
    ) -> Result<T> {
        let body = serde_json::to_vec(body)?;
        let response = self.send(Method::POST, url, Some(body), context).await?;
        parse_json(response, context).await
    }

    async fn get_vnic(&self, vnic_id: &str) -> Result<Vnic> {
        let url = self.url(&format!("/vnics/{}", vnic_id), &[])?;
        self.get_json(url, "get VNIC").await
    }

    async fn primary_private_ip(&self, vnic_id: &str) -> Result<PrivateIp> {
        let url = self.url("/privateIps", &[("vnicId", vnic_id)])?;
        let private_ips: Vec<PrivateIp> = self.get_json(url, "list private IPs").await?;

        private_ips
            .into_iter()
            .find(|ip| ip.is_primary)
            .ok_or_else(|| Error::interface(format!("VNIC {} has no primary private IP", vnic_id)))
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, context: &str) -> Result<T> {
    response.json().await.map_err(|e| {
        Error::provider(PROVIDER, format!("{}: failed to parse response: {}", context, e))
    })
}

/// Map a non-2xx status to the error taxonomy
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    let detail = serde_json::from_str::<ApiError>(body)
        .ok()
        .filter(|e| !e.message.is_empty())
        .map(|e| format!("{} ({})", e.message, e.code))
        .unwrap_or_else(|| body.trim().chars().take(200).collect());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API key or insufficient permissions. Status: {} - {}",
            context, status, detail
        )),
        404 => Error::not_found(format!("{}: {}", context, detail)),
        429 => Error::rate_limited(format!("{}: Status: {} - {}", context, status, detail)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{}: OCI server error (transient): {} - {}", context, status, detail),
        ),
        _ => Error::provider(PROVIDER, format!("{}: {} - {}", context, status, detail)),
    }
}

fn parse_address(text: &str) -> Result<IpAddr> {
    text.trim()
        .parse()
        .map_err(|e| Error::provider(PROVIDER, format!("Invalid IP in response '{}': {}", text, e)))
}

#[async_trait]
impl AddressLifecycleProvider for OciProvider {
    async fn resolve_primary_interface(&self, endpoint: &Endpoint) -> Result<String> {
        let url = self.url(
            "/vnicAttachments",
            &[
                ("compartmentId", endpoint.compartment_id.as_str()),
                ("instanceId", endpoint.instance_id.as_str()),
            ],
        )?;
        let attachments: Vec<VnicAttachment> = self.get_json(url, "list VNIC attachments").await?;

        let attached: Vec<String> = attachments
            .into_iter()
            .filter(|a| a.lifecycle_state == LIFECYCLE_ATTACHED)
            .filter_map(|a| a.vnic_id)
            .collect();

        match attached.as_slice() {
            [] => Err(Error::interface(format!(
                "No attached VNIC for instance {}",
                endpoint.instance_id
            ))),
            [only] => Ok(only.clone()),
            [first, ..] => {
                for vnic_id in &attached {
                    if self.get_vnic(vnic_id).await?.is_primary == Some(true) {
                        return Ok(vnic_id.clone());
                    }
                }
                tracing::warn!(
                    "{} attached VNICs on {}, none flagged primary; using {}",
                    attached.len(),
                    endpoint.instance_id,
                    first
                );
                Ok(first.clone())
            }
        }
    }

    async fn get_public_address(&self, interface_id: &str) -> Result<Option<IpAddr>> {
        let vnic = self.get_vnic(interface_id).await?;
        match vnic.public_ip.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(ip) => parse_address(ip).map(Some),
        }
    }

    async fn release_address(&self, address: IpAddr, scope: &AddressScope) -> Result<()> {
        let url = self.url("/publicIps/actions/getByIpAddress", &[])?;
        let lookup = GetPublicIpByIpAddressDetails {
            ip_address: address.to_string(),
        };
        let public_ip: PublicIp = match self.post_json(url, &lookup, "find public IP").await {
            Ok(public_ip) => public_ip,
            Err(e) if e.is_not_found() => {
                tracing::debug!("Public IP {} no longer exists: {}", address, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if public_ip.lifetime == LIFETIME_RESERVED {
            return Err(Error::invalid_input(format!(
                "Refusing to delete reserved public IP {} on {}",
                address, scope.interface_id
            )));
        }

        let url = self.url(&format!("/publicIps/{}", public_ip.id), &[])?;
        match self.send(Method::DELETE, url, None, "delete public IP").await {
            Ok(_) => {
                tracing::info!("Deleted public IP {}", address);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Public IP {} already deleted", address);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn allocate_ephemeral_address(&self, scope: &AddressScope) -> Result<IpAddr> {
        let private_ip = self.primary_private_ip(&scope.interface_id).await?;

        let url = self.url("/publicIps", &[])?;
        let details = CreatePublicIpDetails {
            compartment_id: scope.compartment_id.clone(),
            lifetime: LIFETIME_EPHEMERAL.to_string(),
            private_ip_id: private_ip.id,
        };
        let public_ip: PublicIp = self.post_json(url, &details, "create public IP").await?;

        let address = parse_address(&public_ip.ip_address)?;
        tracing::info!(
            "Created ephemeral public IP {} on {}",
            address,
            scope.interface_id
        );
        Ok(address)
    }

    fn settle_delays(&self) -> SettleDelays {
        self.settle
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating OCI providers from an account's CLI profile
pub struct OciFactory;

impl AddressProviderFactory for OciFactory {
    fn create(
        &self,
        account: &AccountConfig,
        global: &GlobalConfig,
    ) -> Result<Arc<dyn AddressLifecycleProvider>> {
        let profile = OciProfile::load(&account.oci_config_path, &account.oci_profile)?;
        let private_key = profile.read_private_key()?;

        tracing::debug!(
            account = %account.name,
            "Using OCI profile '{}' in region {}",
            account.oci_profile,
            profile.region
        );

        Ok(Arc::new(OciProvider::new(
            &profile,
            &private_key,
            global.proxy_url(),
        )?))
    }
}

/// Register the OCI provider with a registry
///
/// # Example
///
/// ```rust,ignore
/// use ipguard_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ipguard_provider_oci::register(&registry);
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(OciFactory));
}
