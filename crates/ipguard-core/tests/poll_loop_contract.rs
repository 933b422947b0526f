//! Contract Test: Poll Loop
//!
//! Verifies the monitor's loop-level behavior:
//! - The poll interval is the only backoff after a failed cycle
//! - Cancellation interrupts the poll sleep promptly
//! - Interface resolution failure ends the monitor before any cycle
//! - Events describe each step

mod common;

use common::*;
use ipguard_core::monitor::{CycleStage, EndpointMonitor, MonitorEvent};
use ipguard_core::traits::AddressHistoryStore;
use ipguard_core::MemoryHistoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const VNIC: &str = "ocid1.vnic.oc1..primary";
const POLL: Duration = Duration::from_secs(600);

#[tokio::test(start_paused = true)]
async fn failing_allocation_retries_only_after_poll_interval() {
    let provider = MockProvider::new().failing_allocation();
    let oracle = MockOracle::new();
    let history = MemoryHistoryStore::new();

    let mut monitor = EndpointMonitor::new(
        endpoint("ocid1.instance.oc1..inst0001").with_interface(VNIC),
        Arc::new(provider.clone()),
        Arc::new(oracle.clone()),
        Box::new(history.clone()),
        POLL,
    );
    let mut events = monitor.subscribe(64);

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { monitor.run(token).await });

    let mut failures = 0;
    while failures < 3 {
        if let Some(MonitorEvent::CycleFailed { stage, .. }) = events.recv().await {
            assert_eq!(stage, CycleStage::Allocate);
            failures += 1;
        }
    }

    shutdown.cancel();
    tokio_test::assert_ok!(handle.await.unwrap());

    let attempts = provider.call_times(|c| matches!(c, ProviderCall::Allocate(_)));
    assert_eq!(attempts.len(), 3);
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= POLL, "retry must wait the full poll interval");
    }
    assert!(history.read_all().await.unwrap().is_empty());
    assert!(oracle.checks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_sleep() {
    let provider = MockProvider::new().with_address(VNIC, "10.0.0.1");
    let oracle = MockOracle::new();

    let mut monitor = EndpointMonitor::new(
        endpoint("ocid1.instance.oc1..inst0001").with_interface(VNIC),
        Arc::new(provider.clone()),
        Arc::new(oracle),
        Box::new(MemoryHistoryStore::new()),
        Duration::from_secs(3600),
    );
    let mut events = monitor.subscribe(64);

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let started = tokio::time::Instant::now();
    let handle = tokio::spawn(async move { monitor.run(token).await });

    // Wait for the first cycle to finish
    loop {
        if let Some(MonitorEvent::ReachabilityChecked { .. }) = events.recv().await {
            break;
        }
    }

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "monitor should stop without waiting for the poll interval");
    assert!(started.elapsed() < Duration::from_secs(3600));

    let mut saw_stopped = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, MonitorEvent::Stopped { .. }) {
            saw_stopped = true;
        }
    }
    assert!(saw_stopped);
}

#[tokio::test]
async fn unresolvable_interface_ends_monitor() {
    let provider = MockProvider::new();
    let mut monitor = EndpointMonitor::new(
        endpoint("ocid1.instance.oc1..orphan01"),
        Arc::new(provider.clone()),
        Arc::new(MockOracle::new()),
        Box::new(MemoryHistoryStore::new()),
        POLL,
    );

    let result = monitor.run(CancellationToken::new()).await;

    assert!(result.is_err());
    assert_eq!(provider.resolve_count(), 1);
    assert!(!provider
        .calls()
        .iter()
        .any(|c| matches!(c, ProviderCall::Fetch(_))));
}

#[tokio::test]
async fn events_trace_a_rotation() {
    let provider = MockProvider::new()
        .with_address(VNIC, "1.2.3.4")
        .with_pool(&["5.6.7.8"]);
    let oracle = MockOracle::new().unreachable(&["1.2.3.4"]);

    let mut monitor = EndpointMonitor::new(
        endpoint("ocid1.instance.oc1..inst0001").with_interface(VNIC),
        Arc::new(provider),
        Arc::new(oracle),
        Box::new(MemoryHistoryStore::new()),
        POLL,
    );
    let mut events = monitor.subscribe(64);

    monitor.run_cycle().await;

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            MonitorEvent::AddressFetched { .. } => "fetched",
            MonitorEvent::ReachabilityChecked { .. } => "checked",
            MonitorEvent::RotationStarted { .. } => "rotating",
            MonitorEvent::RotationSucceeded { .. } => "rotated",
            MonitorEvent::Rechecked { .. } => "rechecked",
            other => panic!("unexpected event {:?}", other),
        });
    }

    assert_eq!(
        kinds,
        vec!["fetched", "checked", "rotating", "rotated", "rechecked"]
    );
}

#[tokio::test]
async fn full_event_channel_does_not_block_cycle() {
    let provider = MockProvider::new().with_address(VNIC, "10.0.0.1");
    let mut monitor = EndpointMonitor::new(
        endpoint("ocid1.instance.oc1..inst0001").with_interface(VNIC),
        Arc::new(provider),
        Arc::new(MockOracle::new()),
        Box::new(MemoryHistoryStore::new()),
        POLL,
    );
    let _events = monitor.subscribe(1);

    // Two events per healthy cycle; the second is dropped
    let outcome = tokio::time::timeout(Duration::from_secs(5), monitor.run_cycle()).await;
    assert!(outcome.is_ok());
}
