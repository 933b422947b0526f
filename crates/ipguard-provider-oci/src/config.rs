//! OCI CLI configuration file
//!
//! The file is INI-style: `[PROFILE]` sections of `key=value` lines. A named
//! profile inherits every key from `[DEFAULT]` that it does not override.
//!
//! ```text
//! [DEFAULT]
//! user=ocid1.user.oc1..aaaa
//! fingerprint=12:34:56:...
//! key_file=~/.oci/oci_api_key.pem
//! tenancy=ocid1.tenancy.oc1..aaaa
//! region=us-ashburn-1
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ipguard_core::{Error, Result};

const DEFAULT_SECTION: &str = "DEFAULT";

/// Credentials and region of one OCI CLI profile
#[derive(Clone, PartialEq, Eq)]
pub struct OciProfile {
    pub user: String,
    pub fingerprint: String,
    pub tenancy: String,
    pub region: String,
    pub key_file: PathBuf,
}

// The fingerprint identifies the signing key; keep it out of logs
impl std::fmt::Debug for OciProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciProfile")
            .field("user", &self.user)
            .field("fingerprint", &"<REDACTED>")
            .field("tenancy", &self.tenancy)
            .field("region", &self.region)
            .field("key_file", &self.key_file)
            .finish()
    }
}

impl OciProfile {
    /// Load `profile` from the config file at `path` (`~` is expanded)
    pub fn load(path: &str, profile: &str) -> Result<Self> {
        let path = expand_home(path);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!("Cannot read OCI config {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loading OCI profile '{}' from {}", profile, path.display());
        Self::parse(&text, profile)
    }

    /// Parse `profile` out of the config file contents
    pub fn parse(text: &str, profile: &str) -> Result<Self> {
        let sections = parse_sections(text);

        let defaults = sections.get(DEFAULT_SECTION);
        let named = sections.get(profile);
        if named.is_none() && profile != DEFAULT_SECTION {
            return Err(Error::auth(format!("OCI profile '{}' not found", profile)));
        }

        let lookup = |key: &str| -> Result<String> {
            named
                .and_then(|s| s.get(key))
                .or_else(|| defaults.and_then(|s| s.get(key)))
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| {
                    Error::auth(format!("OCI profile '{}' is missing '{}'", profile, key))
                })
        };

        Ok(Self {
            user: lookup("user")?,
            fingerprint: lookup("fingerprint")?,
            tenancy: lookup("tenancy")?,
            region: lookup("region")?,
            key_file: expand_home(&lookup("key_file")?),
        })
    }

    /// `keyId` of the HTTP signature: `<tenancy>/<user>/<fingerprint>`
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }

    /// Read the PEM private key referenced by `key_file`
    pub fn read_private_key(&self) -> Result<String> {
        std::fs::read_to_string(&self.key_file).map_err(|e| {
            Error::auth(format!(
                "Cannot read OCI private key {}: {}",
                self.key_file.display(),
                e
            ))
        })
    }
}

fn parse_sections(text: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            tracing::debug!("Ignoring malformed OCI config line");
            continue;
        };
        if let Some(section) = &current {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}

/// Expand a leading `~` to the user's home directory
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    Path::new(path).to_path_buf()
}
