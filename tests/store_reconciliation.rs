//! ---
//! tb_section: "06-testing-qa"
//! tb_subsection: "integration-tests"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Integration tests for store reconciliation and change feeds."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tripbench_common::config::DashboardConfig;
use tripbench_core::DashboardStore;
use tripbench_gateway::{DataGateway, InMemoryGateway};
use tripbench_model::{
    ActivityLogEntry, LogKind, McbType, RunConfig, RunResult, ScheduleEntry, TelemetrySample,
    TestRun,
};

fn completed_run(id: &str, result: RunResult) -> TestRun {
    TestRun {
        id: id.to_owned(),
        mcb_type: McbType::B,
        fault_current_ka: 6.0,
        power_factor: 0.95,
        rating_amps: 63,
        voltage: 230.0,
        result: Some(result),
        peak_current_a: Some(150.0),
        duration_seconds: Some(2.5),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn bulk_load_replaces_local_state_wholesale() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = DashboardStore::new(gateway.clone(), DashboardConfig::default());

    // Local-only rows that the backend never saw.
    store.apply_run_insert(completed_run("T-local-1", RunResult::Fail));
    store.apply_run_insert(completed_run("T-local-2", RunResult::Fail));

    gateway.preload(
        vec![completed_run("T-500", RunResult::Pass)],
        vec![ActivityLogEntry::new(LogKind::Success, "Test T-500 completed", "")],
        vec![TelemetrySample::new(None, 0, 230.0, 140.0)],
    );
    gateway.set_schedule(vec![ScheduleEntry {
        id: "S-01".to_owned(),
        mcb_type: McbType::C,
        scheduled_date: Utc::now().date_naive(),
        priority: 1,
        status: "queued".to_owned(),
    }]);
    store.load_initial().await;

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, "T-500");
    assert_eq!(store.pass_rate(), 100);
    assert_eq!(store.activity().len(), 1);
    assert_eq!(store.schedule().len(), 1);
    assert_eq!(store.schedule()[0].id, "S-01");
}

#[tokio::test]
async fn reused_display_id_does_not_shadow_a_new_completion() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = DashboardStore::new(gateway, DashboardConfig::default());

    let mut older = completed_run("T-500", RunResult::Pass);
    older.created_at = Utc::now() - chrono::Duration::minutes(5);
    store.apply_run_insert(older);

    store.begin_run(RunConfig::default());
    store.complete_run(completed_run("T-500", RunResult::Fail));

    // Both runs stay in history and both count toward the pass rate.
    assert_eq!(store.runs().len(), 2);
    assert_eq!(store.pass_rate(), 50);
}

#[tokio::test]
async fn offline_gateway_degrades_to_fallback_and_recovers() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = DashboardStore::new(gateway.clone(), DashboardConfig::default());

    gateway.set_offline(true);
    store.load_initial().await;
    assert!(store.is_degraded());
    assert!(!store.runs().is_empty());
    assert!(!store.live_series().is_empty());

    gateway.set_offline(false);
    gateway.preload(vec![completed_run("T-501", RunResult::Pass)], vec![], vec![]);
    store.load_initial().await;
    assert!(!store.is_degraded());
    assert_eq!(store.runs().len(), 1);
    assert_eq!(store.runs()[0].id, "T-501");
}

#[tokio::test]
async fn interleaved_feed_events_respect_every_window_cap() {
    let gateway = Arc::new(InMemoryGateway::new());
    let caps = DashboardConfig {
        recent_runs_cap: 10,
        activity_cap: 50,
        live_capacity: 200,
        opening_capacity: 500,
    };
    let store = DashboardStore::new(gateway.clone(), caps);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(2);
    let feed = store.spawn_feed_task(shutdown_rx);

    for i in 0..60 {
        let result = if i % 3 == 0 {
            RunResult::Fail
        } else {
            RunResult::Pass
        };
        gateway
            .insert_run(completed_run(&format!("T-{i}"), result))
            .await
            .expect("online");
        gateway
            .insert_log(ActivityLogEntry::new(
                LogKind::Comment,
                format!("event {i}"),
                "",
            ))
            .await
            .expect("online");
        gateway
            .insert_telemetry(vec![TelemetrySample::new(None, i * 20, 230.0, 120.0)])
            .await
            .expect("online");
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    let runs = store.runs();
    assert_eq!(runs.len(), 10);
    // Newest-first: the last inserted run heads the window.
    assert_eq!(runs[0].id, "T-59");
    assert_eq!(store.activity().len(), 50);
    assert!(store.live_series().len() <= 200);

    let passes = runs.iter().filter(|r| r.is_pass()).count();
    let expected = ((passes as f64 / runs.len() as f64) * 100.0).round() as u8;
    assert_eq!(store.pass_rate(), expected);

    let _ = shutdown_tx.send(());
    let _ = feed.await;
}

#[tokio::test]
async fn duplicate_feed_delivery_is_idempotent() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = DashboardStore::new(gateway, DashboardConfig::default());

    let run = completed_run("T-dup", RunResult::Pass);
    store.apply_run_insert(run.clone());
    store.apply_run_insert(run.clone());
    store.apply_run_insert(run);

    assert_eq!(store.runs().len(), 1);
    assert_eq!(store.pass_rate(), 100);
}
