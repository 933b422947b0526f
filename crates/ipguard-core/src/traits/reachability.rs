// # Reachability Oracle Trait
//
// Defines the interface to an external service that reports whether an
// (address, port) pair can be reached from outside the monitored network.
//
// ## Implementations
//
// - HTTP oracle: `ipguard-oracle-http` crate
//
// ## Fail-closed
//
// Oracles never return errors. A timeout, transport error, unexpected status
// or unparseable body becomes `Reachability::Indeterminate`, which the monitor
// handles exactly like `Unreachable`.

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// Tri-state result of a reachability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    /// The oracle confirmed the endpoint answers
    Reachable,
    /// The oracle confirmed the endpoint does not answer
    Unreachable,
    /// The oracle could not give an answer
    Indeterminate {
        /// Why no answer was obtained
        reason: String,
    },
}

impl Reachability {
    /// Create an indeterminate result
    pub fn indeterminate(reason: impl Into<String>) -> Self {
        Self::Indeterminate {
            reason: reason.into(),
        }
    }

    /// Only an explicit positive answer counts as reachable
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => write!(f, "reachable"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Indeterminate { reason } => write!(f, "indeterminate ({})", reason),
        }
    }
}

/// Trait for reachability oracle clients
///
/// Implementations must bound the time of each check and must be usable
/// concurrently from every monitor task.
#[async_trait]
pub trait ReachabilityOracle: Send + Sync {
    /// Check whether `address:port` is reachable from outside
    async fn check(&self, address: IpAddr, port: u16) -> Reachability;
}
