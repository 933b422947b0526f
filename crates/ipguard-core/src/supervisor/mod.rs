//! Monitor supervisor
//!
//! Builds one lifecycle provider per account and runs one [`EndpointMonitor`]
//! task per endpoint inside a [`JoinSet`].
//!
//! Isolation rules:
//!
//! - A provider that cannot be built skips that account only.
//! - A monitor that cannot open its history store or resolve its interface
//!   exits; it is logged and not restarted.
//! - A panicking monitor takes down only its own task.
//!
//! All monitors share one [`CancellationToken`]; cancelling it ends every
//! poll loop at its next sleep and [`Supervisor::run`] returns once all tasks
//! have exited.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::MonitorConfig;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::monitor::EndpointMonitor;
use crate::registry::ProviderRegistry;
use crate::traits::{AddressLifecycleProvider, HistoryStoreFactory, ReachabilityOracle};

/// What happened to the monitors of one supervisor run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Monitor tasks spawned
    pub monitors_started: usize,
    /// Accounts whose provider could not be built
    pub skipped_accounts: Vec<String>,
    /// Endpoints whose monitor exited with an error or panicked
    pub failed_monitors: Vec<String>,
}

/// Launches and awaits all endpoint monitors
pub struct Supervisor {
    config: MonitorConfig,
    registry: Arc<ProviderRegistry>,
    oracle: Arc<dyn ReachabilityOracle>,
    history: Arc<dyn HistoryStoreFactory>,
}

impl Supervisor {
    pub fn new(
        config: MonitorConfig,
        registry: Arc<ProviderRegistry>,
        oracle: Arc<dyn ReachabilityOracle>,
        history: Arc<dyn HistoryStoreFactory>,
    ) -> Self {
        Self {
            config,
            registry,
            oracle,
            history,
        }
    }

    /// Run every monitor until `shutdown` is cancelled and all tasks exit
    pub async fn run(&self, shutdown: CancellationToken) -> SupervisorReport {
        let mut report = SupervisorReport::default();
        let mut tasks: JoinSet<(String, Result<()>)> = JoinSet::new();
        let poll_interval = self.config.global.poll_interval();

        for account in &self.config.accounts {
            let provider = match self.registry.create_provider(account, &self.config.global) {
                Ok(provider) => provider,
                Err(e) => {
                    error!(
                        account = %account.name,
                        "Failed to create {} provider, skipping {} endpoint(s): {}",
                        account.provider,
                        account.servers.len(),
                        e
                    );
                    report.skipped_accounts.push(account.name.clone());
                    continue;
                }
            };

            info!(
                account = %account.name,
                "Provider {} ready, starting {} monitor(s)",
                provider.provider_name(),
                account.servers.len()
            );

            for endpoint in account.endpoints() {
                let label = endpoint.to_string();
                let span = info_span!(
                    "monitor",
                    account = %endpoint.account,
                    instance = %endpoint.instance_suffix(),
                    port = endpoint.port
                );

                let task = run_monitor(
                    endpoint,
                    Arc::clone(&provider),
                    Arc::clone(&self.oracle),
                    Arc::clone(&self.history),
                    poll_interval,
                    shutdown.child_token(),
                );

                tasks.spawn(async move { (label, task.await) }.instrument(span));
                report.monitors_started += 1;
            }
        }

        if report.monitors_started == 0 {
            warn!("No monitors started");
        } else {
            info!("{} monitor(s) running", report.monitors_started);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((label, Ok(()))) => info!("Monitor {} exited", label),
                Ok((label, Err(e))) => {
                    error!("Monitor {} exited with error, not restarting: {}", label, e);
                    report.failed_monitors.push(label);
                }
                Err(e) => {
                    let kind = if e.is_panic() { "panicked" } else { "was cancelled" };
                    error!("Monitor task {}: {}", kind, e);
                    report.failed_monitors.push(format!("<task {}>", kind));
                }
            }
        }

        info!(
            "All monitors exited ({} started, {} failed, {} account(s) skipped)",
            report.monitors_started,
            report.failed_monitors.len(),
            report.skipped_accounts.len()
        );
        report
    }
}

async fn run_monitor(
    endpoint: Endpoint,
    provider: Arc<dyn AddressLifecycleProvider>,
    oracle: Arc<dyn ReachabilityOracle>,
    history: Arc<dyn HistoryStoreFactory>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let store = history.open(&endpoint).await?;
    let mut monitor = EndpointMonitor::new(endpoint, provider, oracle, store, poll_interval);
    monitor.run(shutdown).await
}
