// # ipguardd - reachability monitor daemon
//
// Thin integration layer: all monitoring logic lives in ipguard-core.
//
// The daemon is responsible for:
// 1. Parsing the command line
// 2. Loading and validating the JSON configuration
// 3. Initializing logging and the runtime
// 4. Registering the OCI provider and building the oracle and history stores
// 5. Running the supervisor until SIGTERM/SIGINT
//
// ## Commands
//
// - `ipguardd` / `ipguardd run`: monitor every configured endpoint
// - `ipguardd check`: validate the configuration and print a summary
// - `ipguardd init`: interactive configuration wizard
//
// ## Environment
//
// - `IPGUARD_CONFIG`: configuration file (default `oci_monitor_config.json`)
// - `IPGUARD_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
//
// ## Example
//
// ```bash
// ipguardd init
// ipguardd check
// IPGUARD_LOG_LEVEL=debug ipguardd
// ```

mod wizard;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ipguard_core::{
    FileHistoryStoreFactory, MonitorConfig, ProviderRegistry, Supervisor, SupervisorReport,
};
use ipguard_oracle_http::HttpReachabilityOracle;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long monitors get to finish an in-flight rotation after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpguardExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IpguardExitCode> for ExitCode {
    fn from(code: IpguardExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "ipguardd", version, about = "Rotate the public address of unreachable OCI instances")]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "IPGUARD_CONFIG",
        default_value = "oci_monitor_config.json"
    )]
    config: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, env = "IPGUARD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Monitor every configured endpoint (default)
    Run,
    /// Validate the configuration and print a summary
    Check,
    /// Generate a configuration file interactively
    Init,
}

fn parse_log_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);

    if command == Command::Init {
        return match wizard::run(&cli.config) {
            Ok(_) => IpguardExitCode::CleanShutdown.into(),
            Err(e) => {
                eprintln!("Configuration wizard failed: {}", e);
                IpguardExitCode::ConfigError.into()
            }
        };
    }

    let Some(log_level) = parse_log_level(&cli.log_level) else {
        eprintln!(
            "Log level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            cli.log_level
        );
        return IpguardExitCode::ConfigError.into();
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IpguardExitCode::ConfigError.into();
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(code) => return code.into(),
    };

    if command == Command::Check {
        print_summary(&cli.config, &config);
        return IpguardExitCode::CleanShutdown.into();
    }

    info!("Starting ipguardd");
    info!(
        "Configuration loaded: {} account(s), {} endpoint(s), checking every {}s",
        config.accounts.len(),
        config.endpoint_count(),
        config.global.round_time
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpguardExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {}", e);
                IpguardExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Load and validate the configuration
///
/// A missing file is replaced by a template for the user to fill in; that
/// still counts as a configuration error.
fn load_config(path: &Path) -> std::result::Result<MonitorConfig, IpguardExitCode> {
    if !path.exists() {
        error!("Configuration file {} not found", path.display());
        match MonitorConfig::template().write_to(path) {
            Ok(()) => error!(
                "Wrote a template to {}; fill it in (or run `ipguardd init`) and restart",
                path.display()
            ),
            Err(e) => error!("Failed to write configuration template: {}", e),
        }
        return Err(IpguardExitCode::ConfigError);
    }

    MonitorConfig::load(path).map_err(|e| {
        error!("{}", e);
        IpguardExitCode::ConfigError
    })
}

fn print_summary(path: &Path, config: &MonitorConfig) {
    println!("Configuration {} is valid", path.display());
    println!("  check interval: {}s", config.global.round_time);
    println!("  check service:  {}", config.global.check_server_url);
    println!(
        "  proxy:          {}",
        config.global.proxy_url().unwrap_or("(none)")
    );
    println!("  history dir:    {}", config.global.history_dir);
    for account in &config.accounts {
        println!(
            "  account {} ({}, profile {}): {} endpoint(s)",
            account.name,
            account.oci_config_path,
            account.oci_profile,
            account.servers.len()
        );
        for endpoint in account.endpoints() {
            println!(
                "    {} [{}]",
                endpoint,
                endpoint.interface_id.as_deref().unwrap_or("interface looked up at start")
            );
        }
    }
}

/// Exit code when the supervisor returns without a shutdown signal
///
/// Nothing started means every account was rejected at startup.
fn unexpected_exit_code(report: &SupervisorReport) -> IpguardExitCode {
    if report.monitors_started == 0 {
        IpguardExitCode::ConfigError
    } else {
        IpguardExitCode::RuntimeError
    }
}

/// Run the daemon
async fn run_daemon(config: MonitorConfig) -> Result<IpguardExitCode> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "oci")]
    ipguard_provider_oci::register(&registry);

    if registry.list_providers().is_empty() {
        error!("No lifecycle providers compiled in (enable the `oci` feature)");
        return Ok(IpguardExitCode::ConfigError);
    }
    info!("Registered providers: {}", registry.list_providers().join(", "));

    let oracle = match HttpReachabilityOracle::from_global(&config.global) {
        Ok(oracle) => oracle,
        Err(e) => {
            error!("Failed to create reachability oracle: {}", e);
            return Ok(IpguardExitCode::ConfigError);
        }
    };
    info!("Reachability oracle: {}", oracle.url());
    if let Some(proxy) = config.global.proxy_url() {
        info!("Using proxy {}", proxy);
    }

    let history = FileHistoryStoreFactory::new(&config.global.history_dir);

    let supervisor = Supervisor::new(
        config,
        Arc::new(registry),
        Arc::new(oracle),
        Arc::new(history),
    );

    let shutdown = CancellationToken::new();
    let mut monitors = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { supervisor.run(shutdown).await }
    });

    tokio::select! {
        signal = wait_for_shutdown_signal() => {
            let signal = signal?;
            info!("Received shutdown signal: {}", signal);
            shutdown.cancel();

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut monitors).await {
                Ok(Ok(report)) => {
                    info!("Shutdown complete ({} monitor(s) stopped)", report.monitors_started);
                    Ok(IpguardExitCode::CleanShutdown)
                }
                Ok(Err(e)) => Err(anyhow::anyhow!("Supervisor task failed: {}", e)),
                Err(_) => {
                    monitors.abort();
                    Err(anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT))
                }
            }
        }
        joined = &mut monitors => {
            let report = joined.map_err(|e| anyhow::anyhow!("Supervisor task failed: {}", e))?;
            if !report.skipped_accounts.is_empty() {
                warn!("Skipped accounts: {}", report.skipped_accounts.join(", "));
            }
            error!(
                "All monitors exited ({} started, {} failed)",
                report.monitors_started,
                report.failed_monitors.len()
            );
            Ok(unexpected_exit_code(&report))
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        assert_eq!(parse_log_level("INFO"), Some(Level::INFO));
        assert_eq!(parse_log_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_log_level("verbose"), None);
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["ipguardd"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn cli_subcommands_accept_global_flags() {
        let cli = Cli::try_parse_from(["ipguardd", "check", "--config", "/etc/ipguard.json"]).unwrap();
        assert_eq!(cli.command, Some(Command::Check));
        assert_eq!(cli.config, PathBuf::from("/etc/ipguard.json"));
    }

    #[test]
    fn no_started_monitors_is_a_startup_error() {
        let all_skipped = SupervisorReport {
            monitors_started: 0,
            skipped_accounts: vec!["acct".to_string()],
            failed_monitors: Vec::new(),
        };
        assert_eq!(unexpected_exit_code(&all_skipped), IpguardExitCode::ConfigError);

        let all_failed = SupervisorReport {
            monitors_started: 2,
            skipped_accounts: Vec::new(),
            failed_monitors: vec!["acct/aaaa1111:443".to_string(), "acct/bbbb2222:443".to_string()],
        };
        assert_eq!(unexpected_exit_code(&all_failed), IpguardExitCode::RuntimeError);
    }

    #[test]
    fn missing_config_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oci_monitor_config.json");

        assert_eq!(load_config(&path).unwrap_err(), IpguardExitCode::ConfigError);

        // The template exists now but still has placeholders
        let template = MonitorConfig::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(template, MonitorConfig::template());
        assert_eq!(load_config(&path).unwrap_err(), IpguardExitCode::ConfigError);
    }

    #[test]
    fn valid_config_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "global": {"round_time": 300, "check_server_url": "http://check.example.com/check", "proxy": ""},
                "accounts": [{
                    "name": "acct",
                    "oci_config_path": "~/.oci/config",
                    "oci_profile": "DEFAULT",
                    "servers": [{
                        "compartment_id": "ocid1.compartment.oc1..c",
                        "instance_id": "ocid1.instance.oc1..i",
                        "vnic_id": "",
                        "port": 443
                    }]
                }]
            }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.endpoint_count(), 1);
    }
}
