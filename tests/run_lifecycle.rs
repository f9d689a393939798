//! ---
//! tb_section: "06-testing-qa"
//! tb_subsection: "integration-tests"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Integration tests for the full run lifecycle."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tripbench_common::config::{DashboardConfig, LivefeedConfig, SimulatorConfig};
use tripbench_core::{spawn_livefeed, DashboardStore, RunSimulator, StartError};
use tripbench_gateway::{DataGateway, InMemoryGateway};
use tripbench_model::{McbType, RunConfig, RunStatus};

fn fast_simulator_config() -> SimulatorConfig {
    SimulatorConfig {
        progress_interval: Duration::from_millis(5),
        progress_step: 15,
        run_duration: Duration::from_millis(40),
        pass_bias: 0.7,
        random_seed: 99,
    }
}

fn runtime() -> (Arc<DashboardStore>, Arc<InMemoryGateway>, RunSimulator) {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = DashboardStore::new(gateway.clone(), DashboardConfig::default());
    let simulator = RunSimulator::new(Arc::clone(&store), fast_simulator_config());
    (store, gateway, simulator)
}

#[tokio::test]
async fn completed_run_flows_from_simulator_to_gateway_and_back() {
    let (store, gateway, simulator) = runtime();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(2);
    let feed = store.spawn_feed_task(shutdown_rx);

    let config = RunConfig {
        mcb_type: McbType::B,
        voltage: 240.0,
        fault_current_ka: 6.0,
        power_factor: 0.85,
        rating_amps: 63,
    };
    let run = simulator
        .start(config.clone())
        .expect("run starts")
        .join()
        .await
        .expect("join succeeds")
        .expect("run completed");

    // The local verdict is visible immediately, carrying the submitted config.
    assert_eq!(store.progress(), 100);
    assert!(store.status().is_terminal());
    assert_eq!(store.runs()[0].id, run.id);
    assert_eq!(run.mcb_type, McbType::B);
    assert_eq!(run.voltage, 240.0);
    assert_eq!(run.power_factor, 0.85);
    assert_eq!(store.run_config(), config);

    // Persisted rows and the telemetry burst land shortly after; the change
    // feed must not duplicate the locally applied run.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(store.runs().len(), 1);
    let persisted = gateway.recent_runs(10).await.expect("gateway online");
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, run.id);
    assert!(!store.opening_series().is_empty());
    assert!(store
        .activity()
        .iter()
        .any(|entry| entry.message.contains(&run.id)));

    let _ = shutdown_tx.send(());
    let _ = feed.await;
}

#[tokio::test]
async fn pass_rate_converges_over_many_runs() {
    let (store, _gateway, simulator) = runtime();
    for _ in 0..12 {
        let handle = simulator.start(RunConfig::default()).expect("slot free");
        handle.join().await.expect("join succeeds");
    }
    // Window cap keeps only the newest ten runs.
    let runs = store.runs();
    assert_eq!(runs.len(), 10);
    let passes = runs.iter().filter(|r| r.is_pass()).count();
    let expected = ((passes as f64 / 10.0) * 100.0).round() as u8;
    assert_eq!(store.pass_rate(), expected);
}

#[tokio::test]
async fn cancelled_run_leaves_no_trace() {
    let (store, gateway, simulator) = runtime();
    let handle = simulator.start(RunConfig::default()).expect("run starts");
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.cancel();

    assert_eq!(store.status(), RunStatus::Idle);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(store.runs().is_empty());
    assert!(gateway.recent_runs(10).await.expect("online").is_empty());

    // The slot is free again.
    let rerun = simulator.start(RunConfig::default()).expect("restart ok");
    assert!(rerun.join().await.expect("join").is_some());
}

#[tokio::test]
async fn start_is_exclusive_until_terminal() {
    let (_store, _gateway, simulator) = runtime();
    let first = simulator.start(RunConfig::default()).expect("first starts");
    assert!(matches!(
        simulator.start(RunConfig::default()),
        Err(StartError::AlreadyRunning)
    ));
    first.join().await.expect("join succeeds");
    let second = simulator.start(RunConfig::default()).expect("slot freed");
    second.join().await.expect("join succeeds");
}

#[tokio::test]
async fn livefeed_samples_reach_the_store_during_a_run() {
    let (store, _gateway, simulator) = runtime();
    let (shutdown_tx, _) = broadcast::channel(2);
    let feed = store.spawn_feed_task(shutdown_tx.subscribe());
    let livefeed = spawn_livefeed(
        Arc::clone(&store),
        LivefeedConfig {
            interval: Duration::from_millis(5),
            random_seed: 5,
        },
        shutdown_tx.subscribe(),
    );

    let handle = simulator.start(RunConfig::default()).expect("run starts");
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!store.live_series().is_empty());
    assert!(store.peak_current() > 0.0);
    handle.join().await.expect("join succeeds");

    let _ = shutdown_tx.send(());
    let _ = livefeed.await;
    let _ = feed.await;
}
