//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Aggregate session state store for the dashboard."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tripbench_common::config::DashboardConfig;
use tripbench_gateway::DataGateway;
use tripbench_model::{
    ActivityLogEntry, RunConfig, RunResult, RunStatus, ScheduleEntry, TelemetrySample, TestRun,
};

use crate::seed::FallbackDataset;
use crate::telemetry::TelemetryBuffer;

const LOG_FETCH_LIMIT: usize = 20;
const TELEMETRY_FETCH_LIMIT: usize = 500;
const SCHEDULE_FETCH_LIMIT: usize = 10;
const OVERVIEW_LIVE_TAIL: usize = 20;

/// Session-scoped aggregate state for one dashboard instance.
///
/// Three independent update sources land here: the initial bulk fetch, the
/// gateway change feeds, and local simulator completions. All mutation goes
/// through short write-lock sections applied per event, so interleaving
/// between sources can never corrupt the window caps or the pass-rate count.
/// The pass rate is always computed over the locally retained window only;
/// it is an accepted approximation of the true backend aggregate.
///
/// Reconciliation rule: on `load_initial` the gateway's view wins wholesale.
pub struct DashboardStore {
    gateway: Arc<dyn DataGateway>,
    caps: DashboardConfig,
    state: RwLock<StoreState>,
}

struct StoreState {
    config: RunConfig,
    status: RunStatus,
    progress: u8,
    recent_runs: Vec<TestRun>,
    activity: Vec<ActivityLogEntry>,
    live: TelemetryBuffer,
    opening: TelemetryBuffer,
    schedule: Vec<ScheduleEntry>,
    pass_rate: u8,
    peak_current_a: f64,
    last_update: Option<DateTime<Utc>>,
    degraded: bool,
}

impl DashboardStore {
    pub fn new(gateway: Arc<dyn DataGateway>, caps: DashboardConfig) -> Arc<Self> {
        let state = StoreState {
            config: RunConfig::default(),
            status: RunStatus::Idle,
            progress: 0,
            recent_runs: Vec::new(),
            activity: Vec::new(),
            live: TelemetryBuffer::new(caps.live_capacity),
            opening: TelemetryBuffer::new(caps.opening_capacity),
            schedule: Vec::new(),
            pass_rate: 0,
            peak_current_a: 0.0,
            last_update: None,
            degraded: false,
        };
        Arc::new(Self {
            gateway,
            caps,
            state: RwLock::new(state),
        })
    }

    pub fn gateway(&self) -> Arc<dyn DataGateway> {
        self.gateway.clone()
    }

    /// Bulk-load the session from the gateway. Any fetch failure installs the
    /// deterministic fallback dataset instead of surfacing an error; the view
    /// is never left empty and the session never crashes on a fetch.
    pub async fn load_initial(&self) {
        let fetched = self.fetch_all().await;
        match fetched {
            Ok((runs, logs, telemetry, schedule)) => {
                let mut state = self.state.write();
                state.recent_runs = runs;
                state.recent_runs.truncate(self.caps.recent_runs_cap);
                state.activity = logs;
                state.activity.truncate(self.caps.activity_cap);
                state.live.clear();
                state.opening.clear();
                for sample in telemetry {
                    state.peak_current_a = state.peak_current_a.max(sample.current);
                    state.live.push(sample.clone());
                    state.opening.push(sample);
                }
                state.schedule = schedule;
                state.pass_rate = pass_rate(&state.recent_runs);
                if let Some(peak) = state.recent_runs.first().and_then(|r| r.peak_current_a) {
                    state.peak_current_a = state.peak_current_a.max(peak);
                }
                state.last_update = Some(Utc::now());
                state.degraded = false;
                debug!(
                    runs = state.recent_runs.len(),
                    logs = state.activity.len(),
                    telemetry = state.live.len(),
                    "initial dashboard state loaded"
                );
            }
            Err(err) => {
                warn!(error = %err, "initial fetch failed; installing fallback dataset");
                self.install_fallback();
            }
        }
    }

    async fn fetch_all(
        &self,
    ) -> Result<
        (
            Vec<TestRun>,
            Vec<ActivityLogEntry>,
            Vec<TelemetrySample>,
            Vec<ScheduleEntry>,
        ),
        tripbench_gateway::GatewayError,
    > {
        let runs = self.gateway.recent_runs(self.caps.recent_runs_cap).await?;
        let logs = self.gateway.recent_logs(LOG_FETCH_LIMIT).await?;
        let telemetry = self.gateway.telemetry_window(TELEMETRY_FETCH_LIMIT).await?;
        let schedule = self.gateway.schedule(SCHEDULE_FETCH_LIMIT).await?;
        Ok((runs, logs, telemetry, schedule))
    }

    /// Install the degraded-mode dataset. Also used by the daemon when asked
    /// to seed demo data into an empty gateway.
    pub fn install_fallback(&self) {
        let dataset = FallbackDataset::generate();
        let mut state = self.state.write();
        state.recent_runs = dataset.runs;
        state.recent_runs.truncate(self.caps.recent_runs_cap);
        state.activity = dataset.logs;
        state.activity.truncate(self.caps.activity_cap);
        state.live.clear();
        state.live.extend(dataset.live_series);
        state.opening.clear();
        state.opening.extend(dataset.opening_series);
        state.schedule = dataset.schedule;
        state.pass_rate = pass_rate(&state.recent_runs);
        state.peak_current_a = dataset.peak_current_a;
        state.last_update = Some(Utc::now());
        state.degraded = true;
    }

    /// Prepend a run to the retained window, truncate to the cap, and
    /// recompute the pass rate over exactly the retained rows.
    ///
    /// Inserts are commutative-safe with respect to arrival order: a run that
    /// was already applied optimistically and then echoed by the change feed
    /// arrives as an identical clone and is skipped. Display ids can repeat
    /// across runs, so a row that only shares an id with a retained run is a
    /// distinct run and is kept.
    pub fn apply_run_insert(&self, run: TestRun) {
        let mut state = self.state.write();
        if state
            .recent_runs
            .iter()
            .any(|existing| existing.id == run.id && existing.created_at == run.created_at)
        {
            debug!(run_id = %run.id, "change-feed echo of known run ignored");
            return;
        }
        if let Some(peak) = run.peak_current_a {
            state.peak_current_a = state.peak_current_a.max(peak);
        }
        state.recent_runs.insert(0, run);
        state.recent_runs.truncate(self.caps.recent_runs_cap);
        state.pass_rate = pass_rate(&state.recent_runs);
        state.last_update = Some(Utc::now());
    }

    pub fn apply_log_insert(&self, entry: ActivityLogEntry) {
        let mut state = self.state.write();
        if state.activity.iter().any(|existing| existing.id == entry.id) {
            return;
        }
        state.activity.insert(0, entry);
        state.activity.truncate(self.caps.activity_cap);
    }

    pub fn apply_telemetry_point(&self, sample: TelemetrySample) {
        let mut state = self.state.write();
        state.peak_current_a = state.peak_current_a.max(sample.current);
        state.live.push(sample.clone());
        state.opening.push(sample);
        state.last_update = Some(Utc::now());
    }

    /// Atomic entry gate for the simulator: transitions Idle/terminal to
    /// Running with progress 0 and stores the accepted configuration.
    /// Returns false without mutating anything when a run is already active.
    pub fn begin_run(&self, config: RunConfig) -> bool {
        let mut state = self.state.write();
        if state.status == RunStatus::Running {
            return false;
        }
        state.status = RunStatus::Running;
        state.progress = 0;
        state.peak_current_a = 0.0;
        state.config = config;
        true
    }

    /// Progress ticks never exceed 95; 100 is reserved for the atomic
    /// completion transition.
    pub fn set_progress(&self, progress: u8) {
        let mut state = self.state.write();
        if state.status == RunStatus::Running {
            state.progress = progress.min(95).max(state.progress);
        }
    }

    /// Terminal transition: progress snaps to 100 in the same lock section
    /// that flips the status and appends the run.
    pub fn complete_run(&self, run: TestRun) {
        let result = run.result.unwrap_or(RunResult::Fail);
        {
            let mut state = self.state.write();
            state.progress = 100;
            state.status = result.into();
        }
        self.apply_run_insert(run);
    }

    /// Reset an in-flight run back to Idle. Returns false when nothing was
    /// running.
    pub fn cancel_run(&self) -> bool {
        let mut state = self.state.write();
        if state.status != RunStatus::Running {
            return false;
        }
        state.status = RunStatus::Idle;
        state.progress = 0;
        true
    }

    pub fn status(&self) -> RunStatus {
        self.state.read().status
    }

    pub fn progress(&self) -> u8 {
        self.state.read().progress
    }

    pub fn pass_rate(&self) -> u8 {
        self.state.read().pass_rate
    }

    /// Configuration accepted by the most recent `begin_run`.
    pub fn run_config(&self) -> RunConfig {
        self.state.read().config.clone()
    }

    pub fn runs(&self) -> Vec<TestRun> {
        self.state.read().recent_runs.clone()
    }

    pub fn activity(&self) -> Vec<ActivityLogEntry> {
        self.state.read().activity.clone()
    }

    pub fn schedule(&self) -> Vec<ScheduleEntry> {
        self.state.read().schedule.clone()
    }

    pub fn live_series(&self) -> Vec<TelemetrySample> {
        self.state.read().live.to_vec()
    }

    pub fn opening_series(&self) -> Vec<TelemetrySample> {
        self.state.read().opening.to_vec()
    }

    pub fn peak_current(&self) -> f64 {
        self.state.read().peak_current_a
    }

    pub fn is_degraded(&self) -> bool {
        self.state.read().degraded
    }

    /// Snapshot for the API layer: one consistent read of everything the
    /// top-of-dashboard widgets show.
    pub fn overview(&self) -> Overview {
        let state = self.state.read();
        let failed = state.recent_runs.iter().filter(|r| r.is_fail()).count();
        let total = state.recent_runs.len();
        let risk = risk_items(state.pass_rate, failed, total);
        Overview {
            status: state.status,
            status_label: state.status.label().to_owned(),
            progress: state.progress,
            pass_rate: state.pass_rate,
            risk,
            peak_current_a: state.peak_current_a,
            last_update: state.last_update,
            next_scheduled: state.schedule.first().cloned(),
            total_runs: total,
            failed_runs: failed,
            degraded: state.degraded,
            recent_runs: state.recent_runs.clone(),
            activity: state.activity.clone(),
            schedule: state.schedule.clone(),
            live_tail: state.live.tail(OVERVIEW_LIVE_TAIL),
        }
    }

    /// Apply gateway change-feed events until shutdown. Lagged receivers log
    /// and continue; the skipped rows surface again on the next bulk load.
    pub fn spawn_feed_task(
        self: &Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut runs_rx = store.gateway.subscribe_runs();
        let mut logs_rx = store.gateway.subscribe_logs();
        let mut telemetry_rx = store.gateway.subscribe_telemetry();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!("dashboard feed task shutting down");
                        break;
                    }
                    event = runs_rx.recv() => match event {
                        Ok(run) => store.apply_run_insert(run),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "run change feed lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    event = logs_rx.recv() => match event {
                        Ok(entry) => store.apply_log_insert(entry),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "log change feed lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    event = telemetry_rx.recv() => match event {
                        Ok(sample) => store.apply_telemetry_point(sample),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "telemetry change feed lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

impl std::fmt::Debug for DashboardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("DashboardStore")
            .field("status", &state.status)
            .field("runs", &state.recent_runs.len())
            .field("pass_rate", &state.pass_rate)
            .field("degraded", &state.degraded)
            .finish_non_exhaustive()
    }
}

fn pass_rate(runs: &[TestRun]) -> u8 {
    if runs.is_empty() {
        return 0;
    }
    let passes = runs.iter().filter(|run| run.is_pass()).count();
    ((passes as f64 / runs.len() as f64) * 100.0).round() as u8
}

fn risk_items(pass_rate: u8, failed: usize, total: usize) -> Vec<RiskItem> {
    vec![
        RiskItem {
            value: format!("{}%", 100 - pass_rate.min(100)),
            label: "Test Failure Rate".to_owned(),
            severity: if pass_rate < 80 {
                Severity::Medium
            } else {
                Severity::Low
            },
        },
        RiskItem {
            value: failed.to_string(),
            label: "Failed tests (recent)".to_owned(),
            severity: if failed > 1 {
                Severity::High
            } else {
                Severity::Medium
            },
        },
        RiskItem {
            value: total.to_string(),
            label: "Total tests today".to_owned(),
            severity: Severity::Low,
        },
    ]
}

/// Relative weight shown next to a risk figure.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// One line of the risk-analysis widget.
#[derive(Debug, Clone, Serialize)]
pub struct RiskItem {
    pub value: String,
    pub label: String,
    pub severity: Severity,
}

/// Consistent top-of-dashboard snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub status: RunStatus,
    pub status_label: String,
    pub progress: u8,
    pub pass_rate: u8,
    pub risk: Vec<RiskItem>,
    pub peak_current_a: f64,
    pub last_update: Option<DateTime<Utc>>,
    pub next_scheduled: Option<ScheduleEntry>,
    pub total_runs: usize,
    pub failed_runs: usize,
    pub degraded: bool,
    pub recent_runs: Vec<TestRun>,
    pub activity: Vec<ActivityLogEntry>,
    pub schedule: Vec<ScheduleEntry>,
    pub live_tail: Vec<TelemetrySample>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripbench_gateway::InMemoryGateway;
    use tripbench_model::McbType;

    fn store_with_gateway() -> (Arc<DashboardStore>, Arc<InMemoryGateway>) {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = DashboardStore::new(gateway.clone(), DashboardConfig::default());
        (store, gateway)
    }

    fn completed_run(id: &str, result: RunResult) -> TestRun {
        TestRun {
            id: id.to_owned(),
            mcb_type: McbType::B,
            fault_current_ka: 6.0,
            power_factor: 0.85,
            rating_amps: 63,
            voltage: 240.0,
            result: Some(result),
            peak_current_a: Some(150.0),
            duration_seconds: Some(2.5),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn run_window_never_exceeds_cap_and_pass_rate_tracks_window() {
        let (store, _gateway) = store_with_gateway();
        for i in 0..25 {
            let result = if i % 2 == 0 {
                RunResult::Pass
            } else {
                RunResult::Fail
            };
            store.apply_run_insert(completed_run(&format!("T-{i}"), result));
            assert!(store.runs().len() <= 10);
        }
        let runs = store.runs();
        let passes = runs.iter().filter(|r| r.is_pass()).count();
        let expected = ((passes as f64 / runs.len() as f64) * 100.0).round() as u8;
        assert_eq!(store.pass_rate(), expected);
    }

    #[test]
    fn change_feed_echo_of_local_completion_does_not_double_count() {
        let (store, _gateway) = store_with_gateway();
        let run = completed_run("T-900", RunResult::Pass);
        store.apply_run_insert(run.clone());
        store.apply_run_insert(run);
        assert_eq!(store.runs().len(), 1);
        assert_eq!(store.pass_rate(), 100);
    }

    #[test]
    fn change_feed_echo_does_not_shadow_a_new_run_with_a_reused_id() {
        let (store, _gateway) = store_with_gateway();
        let mut older = completed_run("T-500", RunResult::Pass);
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        store.apply_run_insert(older);

        // A later run draws the same display id. It must still enter history.
        let fresh = completed_run("T-500", RunResult::Fail);
        store.begin_run(RunConfig::default());
        store.complete_run(fresh.clone());
        assert_eq!(store.runs().len(), 2);
        assert_eq!(store.pass_rate(), 50);

        // The gateway echo of that completion is still absorbed.
        store.apply_run_insert(fresh);
        assert_eq!(store.runs().len(), 2);
        assert_eq!(store.pass_rate(), 50);
    }

    #[test]
    fn begin_run_is_an_atomic_gate() {
        let (store, _gateway) = store_with_gateway();
        let config = RunConfig {
            voltage: 240.0,
            power_factor: 0.85,
            ..RunConfig::default()
        };
        assert!(store.begin_run(config.clone()));
        assert!(!store.begin_run(RunConfig::default()));
        assert_eq!(store.status(), RunStatus::Running);
        assert_eq!(store.progress(), 0);
        assert_eq!(store.run_config(), config);
    }

    #[test]
    fn progress_is_monotonic_and_capped_below_completion() {
        let (store, _gateway) = store_with_gateway();
        store.begin_run(RunConfig::default());
        store.set_progress(30);
        store.set_progress(15);
        assert_eq!(store.progress(), 30);
        store.set_progress(99);
        assert_eq!(store.progress(), 95);
        store.complete_run(completed_run("T-1", RunResult::Pass));
        assert_eq!(store.progress(), 100);
        assert_eq!(store.status(), RunStatus::Pass);
    }

    #[test]
    fn cancel_resets_only_a_running_session() {
        let (store, _gateway) = store_with_gateway();
        assert!(!store.cancel_run());
        store.begin_run(RunConfig::default());
        store.set_progress(45);
        assert!(store.cancel_run());
        assert_eq!(store.status(), RunStatus::Idle);
        assert_eq!(store.progress(), 0);
    }

    #[tokio::test]
    async fn load_initial_prefers_gateway_rows() {
        let (store, gateway) = store_with_gateway();
        gateway.preload(
            vec![completed_run("T-10", RunResult::Pass)],
            vec![ActivityLogEntry::new(
                tripbench_model::LogKind::Success,
                "Test T-10 completed",
                "",
            )],
            vec![TelemetrySample::new(None, 0, 230.0, 120.0)],
        );
        store.load_initial().await;
        assert!(!store.is_degraded());
        assert_eq!(store.runs().len(), 1);
        assert_eq!(store.pass_rate(), 100);
        assert_eq!(store.live_series().len(), 1);
    }

    #[tokio::test]
    async fn load_initial_falls_back_when_gateway_is_offline() {
        let (store, gateway) = store_with_gateway();
        gateway.set_offline(true);
        store.load_initial().await;
        assert!(store.is_degraded());
        assert_eq!(store.runs().len(), 8);
        assert!(!store.live_series().is_empty());
        assert_eq!(store.pass_rate(), 75);
    }

    #[tokio::test]
    async fn reload_discards_optimistic_rows_missing_remotely() {
        let (store, gateway) = store_with_gateway();
        gateway.preload(vec![completed_run("T-1", RunResult::Pass)], vec![], vec![]);
        store.apply_run_insert(completed_run("T-local", RunResult::Fail));
        store.load_initial().await;
        let runs = store.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, "T-1");
    }

    #[tokio::test]
    async fn feed_task_applies_gateway_inserts() {
        let (store, gateway) = store_with_gateway();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let feed = store.spawn_feed_task(shutdown_rx);

        gateway
            .insert_run(completed_run("T-77", RunResult::Fail))
            .await
            .unwrap();
        gateway
            .insert_telemetry(vec![TelemetrySample::new(None, 0, 230.0, 180.0)])
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(store.runs().len(), 1);
        assert_eq!(store.live_series().len(), 1);
        assert!((store.peak_current() - 180.0).abs() < f64::EPSILON);

        let _ = shutdown_tx.send(());
        let _ = feed.await;
    }

    #[test]
    fn overview_reports_risk_and_counts() {
        let (store, _gateway) = store_with_gateway();
        store.apply_run_insert(completed_run("T-1", RunResult::Fail));
        store.apply_run_insert(completed_run("T-2", RunResult::Fail));
        store.apply_run_insert(completed_run("T-3", RunResult::Pass));
        let overview = store.overview();
        assert_eq!(overview.total_runs, 3);
        assert_eq!(overview.failed_runs, 2);
        assert_eq!(overview.pass_rate, 33);
        assert_eq!(overview.risk.len(), 3);
        assert_eq!(overview.risk[0].value, "67%");
        assert_eq!(overview.risk[1].severity, Severity::High);
        assert_eq!(overview.recent_runs.len(), 3);
        assert_eq!(overview.recent_runs[0].id, "T-3");
    }

    #[test]
    fn empty_window_has_zero_pass_rate() {
        assert_eq!(pass_rate(&[]), 0);
    }
}
