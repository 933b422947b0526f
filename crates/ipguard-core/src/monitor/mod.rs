//! Endpoint monitor
//!
//! One [`EndpointMonitor`] watches one endpoint. Each cycle:
//!
//! ```text
//!  FETCH_ADDRESS ──► DECIDE ──reachable──────────────────────────┐
//!        ▲             │                                          │
//!        │             ├─no address──► ROTATE (allocate only) ───┤
//!        │             │                                          │
//!        │             └─unreachable / indeterminate──► ROTATE ──┤
//!        │                                    (+ one diagnostic   │
//!        │                                       re-check)        ▼
//!        └──────────────────────────────────────────────────── SLEEP
//! ```
//!
//! ROTATE releases the current address (if any), waits the provider's
//! after-release settle delay, allocates an ephemeral address, waits the
//! after-allocation settle delay, reads the address back and appends it to
//! the history store.
//!
//! Any failure aborts only the current cycle. There is no in-cycle retry; the
//! poll interval is the backoff. The poll sleep is the only point where a
//! shutdown signal interrupts the monitor.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::traits::{
    AddressHistoryStore, AddressLifecycleProvider, AddressScope, Reachability,
    ReachabilityOracle,
};

/// Result of one rotation attempt that reached the read-back step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    /// Address before the rotation, if one was assigned
    pub previous: Option<IpAddr>,
    /// Address read back after allocation
    pub new_address: IpAddr,
    /// False when the provider handed back the address that was just released
    pub success: bool,
    /// When the rotation completed
    pub rotated_at: chrono::DateTime<chrono::Utc>,
}

/// Why a rotation was started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationReason {
    /// The endpoint had no public address
    NoAddress,
    /// The oracle did not confirm reachability
    NotReachable(Reachability),
}

/// Step of a cycle that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    ResolveInterface,
    FetchAddress,
    Release,
    Allocate,
    Confirm,
    Record,
}

impl std::fmt::Display for CycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleStage::ResolveInterface => "resolve interface",
            CycleStage::FetchAddress => "fetch address",
            CycleStage::Release => "release address",
            CycleStage::Allocate => "allocate address",
            CycleStage::Confirm => "confirm address",
            CycleStage::Record => "record history",
        };
        f.write_str(name)
    }
}

/// What one poll cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The oracle confirmed the current address; nothing changed
    Healthy { address: IpAddr },

    /// A rotation completed
    Rotated {
        reason: RotationReason,
        outcome: RotationOutcome,
        /// Diagnostic re-check of the new address (only after unreachability)
        recheck: Option<Reachability>,
    },

    /// The cycle was aborted
    Failed { stage: CycleStage, error: String },
}

/// Events emitted by the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Monitor resolved its interface and entered the poll loop
    Started {
        endpoint: String,
        interface_id: String,
    },

    /// Current address read from the provider
    AddressFetched {
        endpoint: String,
        address: Option<IpAddr>,
    },

    /// Oracle answered for the current address
    ReachabilityChecked {
        endpoint: String,
        address: IpAddr,
        result: Reachability,
    },

    /// Rotation about to start
    RotationStarted {
        endpoint: String,
        previous: Option<IpAddr>,
    },

    /// Rotation completed and the new address was recorded
    RotationSucceeded {
        endpoint: String,
        outcome: RotationOutcome,
    },

    /// Diagnostic re-check of a freshly rotated address
    Rechecked {
        endpoint: String,
        address: IpAddr,
        result: Reachability,
    },

    /// Cycle aborted
    CycleFailed {
        endpoint: String,
        stage: CycleStage,
        error: String,
    },

    /// Monitor left its poll loop
    Stopped { endpoint: String, reason: String },
}

struct StageError {
    stage: CycleStage,
    error: Error,
}

impl StageError {
    fn new(stage: CycleStage, error: Error) -> Self {
        Self { stage, error }
    }
}

/// Per-endpoint monitoring state machine
///
/// ## Lifecycle
///
/// 1. Create with [`EndpointMonitor::new()`]
/// 2. Optionally [`subscribe()`](EndpointMonitor::subscribe) to events
/// 3. [`run()`](EndpointMonitor::run) until the cancellation token fires
///
/// `run()` fails only when the interface cannot be resolved; once in the poll
/// loop every error is logged and the loop continues.
pub struct EndpointMonitor {
    /// Endpoint under watch; `interface_id` is filled in once resolved
    endpoint: Endpoint,

    /// Lifecycle provider for the endpoint's account
    provider: Arc<dyn AddressLifecycleProvider>,

    /// Reachability oracle
    oracle: Arc<dyn ReachabilityOracle>,

    /// History store owned by this monitor
    history: Box<dyn AddressHistoryStore>,

    /// Wait between cycles
    poll_interval: Duration,

    /// Event sender for external observation
    event_tx: Option<mpsc::Sender<MonitorEvent>>,
}

impl EndpointMonitor {
    pub fn new(
        endpoint: Endpoint,
        provider: Arc<dyn AddressLifecycleProvider>,
        oracle: Arc<dyn ReachabilityOracle>,
        history: Box<dyn AddressHistoryStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            endpoint,
            provider,
            oracle,
            history,
            poll_interval,
            event_tx: None,
        }
    }

    /// Receive [`MonitorEvent`]s through a bounded channel
    ///
    /// When the channel is full, events are dropped with a warning.
    pub fn subscribe(&mut self, capacity: usize) -> mpsc::Receiver<MonitorEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.event_tx = Some(tx);
        rx
    }

    /// The endpoint, including its interface once resolved
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Resolve and cache the endpoint's interface
    ///
    /// A configured interface is used as-is. A resolved interface is never
    /// re-resolved for the life of this monitor.
    pub async fn ensure_interface(&mut self) -> Result<String> {
        if let Some(interface_id) = &self.endpoint.interface_id {
            return Ok(interface_id.clone());
        }

        let interface_id = self
            .provider
            .resolve_primary_interface(&self.endpoint)
            .await?;
        info!(
            endpoint = %self.endpoint,
            "Resolved primary interface {}", interface_id
        );
        self.endpoint.interface_id = Some(interface_id.clone());
        Ok(interface_id)
    }

    /// Run the poll loop until `shutdown` is cancelled
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shutdown requested
    /// - `Err(Error)`: The interface could not be resolved; nothing was monitored
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let interface_id = match self.ensure_interface().await {
            Ok(id) => id,
            Err(e) => {
                error!(endpoint = %self.endpoint, "Failed to resolve primary interface: {}", e);
                self.emit_event(MonitorEvent::Stopped {
                    endpoint: self.endpoint.to_string(),
                    reason: format!("interface resolution failed: {}", e),
                });
                return Err(e);
            }
        };

        info!(
            endpoint = %self.endpoint,
            "Monitoring started (interface {}, every {:?})",
            interface_id,
            self.poll_interval
        );
        self.emit_event(MonitorEvent::Started {
            endpoint: self.endpoint.to_string(),
            interface_id,
        });

        while !shutdown.is_cancelled() {
            self.run_cycle().await;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(endpoint = %self.endpoint, "Monitoring stopped");
        self.emit_event(MonitorEvent::Stopped {
            endpoint: self.endpoint.to_string(),
            reason: "Shutdown signal".to_string(),
        });
        Ok(())
    }

    /// Run exactly one FETCH_ADDRESS → DECIDE → ROTATE cycle
    ///
    /// Never fails: errors are logged, emitted and returned as
    /// [`CycleOutcome::Failed`].
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = match self.cycle().await {
            Ok(outcome) => outcome,
            Err(StageError { stage, error }) => {
                error!(endpoint = %self.endpoint, "Cycle aborted at {}: {}", stage, error);
                CycleOutcome::Failed {
                    stage,
                    error: error.to_string(),
                }
            }
        };

        if let CycleOutcome::Failed { stage, error } = &outcome {
            self.emit_event(MonitorEvent::CycleFailed {
                endpoint: self.endpoint.to_string(),
                stage: *stage,
                error: error.clone(),
            });
        }

        outcome
    }

    async fn cycle(&mut self) -> std::result::Result<CycleOutcome, StageError> {
        let interface_id = self
            .ensure_interface()
            .await
            .map_err(|e| StageError::new(CycleStage::ResolveInterface, e))?;
        let scope = AddressScope::new(self.endpoint.compartment_id.clone(), interface_id);

        // FETCH_ADDRESS
        let current = self
            .provider
            .get_public_address(&scope.interface_id)
            .await
            .map_err(|e| StageError::new(CycleStage::FetchAddress, e))?;
        self.emit_event(MonitorEvent::AddressFetched {
            endpoint: self.endpoint.to_string(),
            address: current,
        });

        // DECIDE
        let Some(address) = current else {
            warn!(endpoint = %self.endpoint, "No public address assigned, allocating one");
            let outcome = self.rotate(None, &scope).await?;
            return Ok(CycleOutcome::Rotated {
                reason: RotationReason::NoAddress,
                outcome,
                recheck: None,
            });
        };

        let result = self.oracle.check(address, self.endpoint.port).await;
        self.emit_event(MonitorEvent::ReachabilityChecked {
            endpoint: self.endpoint.to_string(),
            address,
            result: result.clone(),
        });

        if result.is_reachable() {
            info!(endpoint = %self.endpoint, "{} is reachable", address);
            return Ok(CycleOutcome::Healthy { address });
        }

        warn!(
            endpoint = %self.endpoint,
            "{} is {}, rotating public address", address, result
        );

        // ROTATE
        let outcome = self.rotate(Some(address), &scope).await?;

        // One diagnostic re-check; its result never triggers another rotation
        let recheck = self
            .oracle
            .check(outcome.new_address, self.endpoint.port)
            .await;
        if recheck.is_reachable() {
            info!(endpoint = %self.endpoint, "New address {} is reachable", outcome.new_address);
        } else {
            warn!(
                endpoint = %self.endpoint,
                "New address {} is {}; deferring to next cycle",
                outcome.new_address,
                recheck
            );
        }
        self.emit_event(MonitorEvent::Rechecked {
            endpoint: self.endpoint.to_string(),
            address: outcome.new_address,
            result: recheck.clone(),
        });

        Ok(CycleOutcome::Rotated {
            reason: RotationReason::NotReachable(result),
            outcome,
            recheck: Some(recheck),
        })
    }

    async fn rotate(
        &self,
        previous: Option<IpAddr>,
        scope: &AddressScope,
    ) -> std::result::Result<RotationOutcome, StageError> {
        let delays = self.provider.settle_delays();

        self.emit_event(MonitorEvent::RotationStarted {
            endpoint: self.endpoint.to_string(),
            previous,
        });

        if let Some(address) = previous {
            match self.provider.release_address(address, scope).await {
                Ok(()) => info!(endpoint = %self.endpoint, "Released {}", address),
                Err(e) if e.is_not_found() => {
                    debug!(endpoint = %self.endpoint, "{} already released: {}", address, e);
                }
                Err(e) => return Err(StageError::new(CycleStage::Release, e)),
            }
            tokio::time::sleep(delays.after_release).await;
        }

        let allocated = self
            .provider
            .allocate_ephemeral_address(scope)
            .await
            .map_err(|e| StageError::new(CycleStage::Allocate, e))?;
        debug!(endpoint = %self.endpoint, "Allocated {}", allocated);
        tokio::time::sleep(delays.after_allocate).await;

        let confirmed = self
            .provider
            .get_public_address(&scope.interface_id)
            .await
            .map_err(|e| StageError::new(CycleStage::Confirm, e))?
            .ok_or_else(|| {
                StageError::new(
                    CycleStage::Confirm,
                    Error::provider(
                        self.provider.provider_name(),
                        format!("no public address on {} after allocation", scope.interface_id),
                    ),
                )
            })?;

        if confirmed != allocated {
            warn!(
                endpoint = %self.endpoint,
                "Allocated {} but interface reports {}", allocated, confirmed
            );
        }

        match self.history.contains(confirmed).await {
            Ok(true) => warn!(
                endpoint = %self.endpoint,
                "Provider reassigned previously used address {}", confirmed
            ),
            Ok(false) => {}
            Err(e) => warn!(endpoint = %self.endpoint, "Failed to read address history: {}", e),
        }

        self.history
            .record(confirmed)
            .await
            .map_err(|e| StageError::new(CycleStage::Record, e))?;

        let outcome = RotationOutcome {
            previous,
            new_address: confirmed,
            success: previous != Some(confirmed),
            rotated_at: chrono::Utc::now(),
        };

        if outcome.success {
            info!(
                endpoint = %self.endpoint,
                "Rotated public address {} -> {}",
                previous.map(|ip| ip.to_string()).unwrap_or_else(|| "none".to_string()),
                confirmed
            );
        } else {
            warn!(
                endpoint = %self.endpoint,
                "Rotation returned the same address {}", confirmed
            );
        }

        self.emit_event(MonitorEvent::RotationSucceeded {
            endpoint: self.endpoint.to_string(),
            outcome: outcome.clone(),
        });

        Ok(outcome)
    }

    fn emit_event(&self, event: MonitorEvent) {
        if let Some(tx) = &self.event_tx
            && let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event)
        {
            warn!(endpoint = %self.endpoint, "Event channel full, dropping event");
        }
    }
}
