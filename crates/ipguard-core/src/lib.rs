// # ipguard-core
//
// Core library for keeping cloud instances reachable from the outside.
//
// ## Architecture Overview
//
// - **AddressLifecycleProvider**: Read, release and allocate an instance's public address
// - **ReachabilityOracle**: Ask an outside observer whether an (address, port) answers
// - **AddressHistoryStore**: Durable, append-only per-endpoint address history
// - **EndpointMonitor**: Per-endpoint fetch → decide → rotate → sleep state machine
// - **Supervisor**: One provider per account, one monitor task per endpoint
// - **ProviderRegistry**: Plugin-based registry for lifecycle providers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from cloud and oracle adapters
// 2. **Isolation**: One endpoint's failure never reaches another endpoint
// 3. **Fail-closed**: An oracle that cannot answer never counts as "reachable"
// 4. **Library-First**: The daemon is a thin layer over this crate

pub mod config;
pub mod endpoint;
pub mod error;
pub mod history;
pub mod monitor;
pub mod registry;
pub mod supervisor;
pub mod traits;

// Re-export core types for convenience
pub use config::{AccountConfig, GlobalConfig, MonitorConfig, ServerConfig};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use history::{
    FileHistoryStore, FileHistoryStoreFactory, MemoryHistoryStore, MemoryHistoryStoreFactory,
};
pub use monitor::{CycleOutcome, CycleStage, EndpointMonitor, MonitorEvent, RotationOutcome};
pub use registry::ProviderRegistry;
pub use supervisor::{Supervisor, SupervisorReport};
pub use traits::{
    AddressHistoryStore, AddressLifecycleProvider, AddressScope, Reachability,
    ReachabilityOracle, SettleDelays,
};
