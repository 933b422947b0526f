//! OCI Core Services wire types (API version 20160918)
//!
//! Only the fields the provider reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

pub const LIFECYCLE_ATTACHED: &str = "ATTACHED";
pub const LIFETIME_EPHEMERAL: &str = "EPHEMERAL";
pub const LIFETIME_RESERVED: &str = "RESERVED";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnicAttachment {
    pub id: String,
    pub lifecycle_state: String,
    #[serde(default)]
    pub vnic_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vnic {
    pub id: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub is_primary: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateIp {
    pub id: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIp {
    pub id: String,
    pub ip_address: String,
    pub lifetime: String,
    #[serde(default)]
    pub lifecycle_state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPublicIpByIpAddressDetails {
    pub ip_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePublicIpDetails {
    pub compartment_id: String,
    pub lifetime: String,
    pub private_ip_id: String,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
