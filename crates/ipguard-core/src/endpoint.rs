//! Endpoint identity

use std::fmt;

/// Number of trailing instance-id characters used to key per-endpoint files
pub const INSTANCE_SUFFIX_LEN: usize = 8;

/// One monitored compute instance and port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Account the instance belongs to
    pub account: String,

    /// Compartment holding the instance and its addresses
    pub compartment_id: String,

    /// Instance identifier
    pub instance_id: String,

    /// Primary network interface, if known up front
    pub interface_id: Option<String>,

    /// Port checked by the reachability oracle
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint whose interface is resolved lazily
    pub fn new(
        account: impl Into<String>,
        compartment_id: impl Into<String>,
        instance_id: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            account: account.into(),
            compartment_id: compartment_id.into(),
            instance_id: instance_id.into(),
            interface_id: None,
            port,
        }
    }

    /// Pin the interface instead of resolving it
    pub fn with_interface(mut self, interface_id: impl Into<String>) -> Self {
        self.interface_id = Some(interface_id.into());
        self
    }

    /// Trailing characters of the instance id, used as a short display key
    ///
    /// Also keys the history file, so two instances whose ids share the
    /// last [`INSTANCE_SUFFIX_LEN`] characters share one history.
    pub fn instance_suffix(&self) -> &str {
        let id = self.instance_id.as_str();
        let start = id
            .char_indices()
            .rev()
            .nth(INSTANCE_SUFFIX_LEN - 1)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &id[start..]
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.account, self.instance_suffix(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_takes_last_eight_chars() {
        let endpoint = Endpoint::new("a", "c", "ocid1.instance.oc1..abcdefgh12345678", 443);
        assert_eq!(endpoint.instance_suffix(), "12345678");
        assert_eq!(endpoint.to_string(), "a/12345678:443");
    }

    #[test]
    fn suffix_of_short_id_is_whole_id() {
        let endpoint = Endpoint::new("a", "c", "i-1", 22);
        assert_eq!(endpoint.instance_suffix(), "i-1");
    }
}
