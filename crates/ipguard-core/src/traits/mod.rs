//! Core traits for ipguard
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressLifecycleProvider`]: Read, release and allocate public addresses
//! - [`ReachabilityOracle`]: Ask an outside observer whether an endpoint answers
//! - [`AddressHistoryStore`]: Durable per-endpoint address history

pub mod address_provider;
pub mod history_store;
pub mod reachability;

pub use address_provider::{
    AddressLifecycleProvider, AddressProviderFactory, AddressScope, SettleDelays,
};
pub use history_store::{AddressHistoryStore, HistoryStoreFactory};
pub use reachability::{Reachability, ReachabilityOracle};
