// # Address History Store Trait
//
// Defines the interface for the per-endpoint record of every public address
// ever assigned.
//
// ## Purpose
//
// - Audit trail of rotations, surviving restarts
// - Lets the monitor notice when the provider hands back an address it has
//   already assigned (and probably blocked) before
//
// ## Implementations
//
// - File-based: one plain-text file per endpoint, one address per line
// - In-memory: tests and embedding
//
// ## Usage
//
// ```rust,ignore
// use ipguard_core::AddressHistoryStore;
//
// let appended = store.record("203.0.113.7".parse()?).await?;
// let all = store.read_all().await?; // append order
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::endpoint::Endpoint;

/// Trait for address history store implementations
///
/// The set of recorded addresses is append-only and deduplicated. Each store
/// has exactly one writer: the monitor owning the endpoint.
#[async_trait]
pub trait AddressHistoryStore: Send + Sync {
    /// Append an address unless it is already present
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The address was appended
    /// - `Ok(false)`: The address was already recorded (no-op)
    /// - `Err(Error)`: Storage error
    async fn record(&self, address: IpAddr) -> Result<bool, crate::Error>;

    /// All recorded addresses, in append order
    ///
    /// Creates an empty store on first access.
    async fn read_all(&self) -> Result<Vec<IpAddr>, crate::Error>;

    /// Whether an address has been recorded before
    async fn contains(&self, address: IpAddr) -> Result<bool, crate::Error> {
        Ok(self.read_all().await?.contains(&address))
    }
}

/// Helper trait for opening one history store per endpoint
#[async_trait]
pub trait HistoryStoreFactory: Send + Sync {
    /// Open (or create) the store for `endpoint`
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn AddressHistoryStore>, crate::Error>;
}
