//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Timed trip-test run simulator with cancellable handles."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tripbench_common::config::SimulatorConfig;
use tripbench_gateway::DataGateway;
use tripbench_model::{
    ActivityLogEntry, ConfigValidationError, LogKind, RunConfig, RunResult, TelemetrySample,
    TestRun,
};

use crate::store::DashboardStore;

const PROGRESS_CEILING: u8 = 95;
const TELEMETRY_BURST_SAMPLES: u32 = 10;
const TELEMETRY_BURST_STEP_MS: u64 = 50;

/// Why a run could not be started.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),
    #[error("a test run is already in progress")]
    AlreadyRunning,
}

/// Drives one simulated trip test per `start` call: a progress ticker that
/// climbs toward 95, and a completion timer that resolves the outcome,
/// commits it to the store, and persists best-effort through the gateway.
///
/// Outcomes are drawn from a seeded RNG so a fixed seed replays the same
/// sequence of verdicts across daemon restarts.
pub struct RunSimulator {
    store: Arc<DashboardStore>,
    config: SimulatorConfig,
    rng: Mutex<StdRng>,
}

impl RunSimulator {
    pub fn new(store: Arc<DashboardStore>, config: SimulatorConfig) -> Self {
        let rng = Mutex::new(StdRng::seed_from_u64(config.random_seed));
        Self { store, config, rng }
    }

    /// Validate, claim the single run slot, and spawn the timed tasks.
    ///
    /// The returned handle owns the run: dropping it aborts the tasks, so
    /// callers that want the run to finish must `join` or hold it.
    pub fn start(&self, run_config: RunConfig) -> Result<RunHandle, StartError> {
        run_config.validate()?;
        if !self.store.begin_run(run_config.clone()) {
            return Err(StartError::AlreadyRunning);
        }

        // One child RNG per run keeps draws deterministic regardless of how
        // long the spawned tasks take to get scheduled.
        let child_seed: u64 = self.rng.lock().gen();
        let run_rng = StdRng::seed_from_u64(child_seed);

        info!(
            mcb_type = %run_config.mcb_type,
            fault_current_ka = run_config.fault_current_ka,
            rating_amps = run_config.rating_amps,
            "test run started"
        );
        spawn_audit_log(
            &self.store,
            LogKind::Comment,
            "Test started".to_owned(),
            format!(
                "MCB Type {} at {} kA",
                run_config.mcb_type, run_config.fault_current_ka
            ),
        );

        let progress = spawn_progress_task(
            Arc::clone(&self.store),
            self.config.progress_interval,
            self.config.progress_step,
        );
        let progress_abort = progress.abort_handle();
        let completion = spawn_completion_task(
            Arc::clone(&self.store),
            self.config.clone(),
            run_config,
            run_rng,
            progress_abort,
        );

        Ok(RunHandle {
            progress: Some(progress),
            completion: Some(completion),
            store: Arc::clone(&self.store),
        })
    }
}

/// Ownership of one in-flight simulated run.
pub struct RunHandle {
    progress: Option<JoinHandle<()>>,
    completion: Option<JoinHandle<TestRun>>,
    store: Arc<DashboardStore>,
}

impl RunHandle {
    /// Abort both tasks and reset the session to Idle. No partial run row is
    /// ever committed for a cancelled run.
    pub fn cancel(mut self) {
        if let Some(task) = self.completion.take() {
            task.abort();
        }
        if let Some(task) = self.progress.take() {
            task.abort();
        }
        if self.store.cancel_run() {
            info!("test run cancelled");
        }
    }

    /// Wait for the run to finish. Returns `None` when the run was aborted
    /// before its completion timer fired.
    pub async fn join(mut self) -> anyhow::Result<Option<TestRun>> {
        let completion = match self.completion.take() {
            Some(task) => task,
            None => return Ok(None),
        };
        match completion.await {
            Ok(run) => {
                if let Some(task) = self.progress.take() {
                    task.abort();
                }
                Ok(Some(run))
            }
            Err(err) if err.is_cancelled() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Let the run finish on its own without holding the handle. Used by
    /// callers that only care about the eventual change-feed events.
    pub fn detach(mut self) {
        self.progress.take();
        self.completion.take();
    }

    pub fn is_finished(&self) -> bool {
        self.completion
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if let Some(task) = self.completion.take() {
            task.abort();
        }
        if let Some(task) = self.progress.take() {
            task.abort();
        }
    }
}

fn spawn_progress_task(
    store: Arc<DashboardStore>,
    interval: std::time::Duration,
    step: u8,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let mut progress: u8 = 0;
        while progress < PROGRESS_CEILING {
            ticker.tick().await;
            progress = progress.saturating_add(step).min(PROGRESS_CEILING);
            store.set_progress(progress);
        }
    })
}

fn spawn_completion_task(
    store: Arc<DashboardStore>,
    config: SimulatorConfig,
    run_config: RunConfig,
    mut rng: StdRng,
    progress_abort: tokio::task::AbortHandle,
) -> JoinHandle<TestRun> {
    tokio::spawn(async move {
        tokio::time::sleep(config.run_duration).await;
        progress_abort.abort();

        let passed = rng.gen::<f64>() < config.pass_bias;
        let peak_current_a = round1(100.0 + rng.gen::<f64>() * 200.0);
        let duration_seconds = round1(2.0 + rng.gen::<f64>() * 3.0);
        let run = TestRun {
            id: draw_run_id(&mut rng, &store.runs()),
            mcb_type: run_config.mcb_type,
            fault_current_ka: run_config.fault_current_ka,
            power_factor: run_config.power_factor,
            rating_amps: run_config.rating_amps,
            voltage: run_config.voltage,
            result: Some(if passed { RunResult::Pass } else { RunResult::Fail }),
            peak_current_a: Some(peak_current_a),
            duration_seconds: Some(duration_seconds),
            created_at: chrono::Utc::now(),
        };

        store.complete_run(run.clone());
        info!(
            run_id = %run.id,
            result = if passed { "pass" } else { "fail" },
            peak_current_a,
            duration_seconds,
            "test run completed"
        );

        persist_completion(&store, &run, &mut rng).await;
        run
    })
}

/// Best-effort persistence after a completion: the local verdict already
/// stands, so gateway rejections only log.
async fn persist_completion(store: &DashboardStore, run: &TestRun, rng: &mut StdRng) {
    let gateway = store.gateway();
    if let Err(err) = gateway.insert_run(run.clone()).await {
        warn!(run_id = %run.id, error = %err, "failed to persist run row");
    }

    let peak = run.peak_current_a.unwrap_or(0.0);
    let burst: Vec<TelemetrySample> = (0..TELEMETRY_BURST_SAMPLES)
        .map(|i| {
            let decay = (-0.05 * i as f64).exp();
            let voltage = 230.0 * decay * (1.0 + rng.gen::<f64>() * 0.03);
            let current = peak / (i as f64 + 1.0) * (1.0 + rng.gen::<f64>() * 0.05);
            TelemetrySample::new(
                Some(run.id.clone()),
                u64::from(i) * TELEMETRY_BURST_STEP_MS,
                voltage,
                current,
            )
        })
        .collect();
    if let Err(err) = gateway.insert_telemetry(burst).await {
        warn!(run_id = %run.id, error = %err, "failed to persist telemetry burst");
    }

    let (kind, message, detail) = if run.is_pass() {
        (
            LogKind::Success,
            format!("Test {} completed", run.id),
            format!("Result: PASS - peak {peak:.1} A"),
        )
    } else {
        (
            LogKind::Warning,
            format!("Test {} failed", run.id),
            format!("MCB Type {} exceeded threshold", run.mcb_type),
        )
    };
    if let Err(err) = gateway.insert_log(ActivityLogEntry::new(kind, message, detail)).await {
        warn!(run_id = %run.id, error = %err, "failed to persist completion log");
    }
}

fn spawn_audit_log(store: &Arc<DashboardStore>, kind: LogKind, message: String, detail: String) {
    let gateway = store.gateway();
    tokio::spawn(async move {
        if let Err(err) = gateway.insert_log(ActivityLogEntry::new(kind, message, detail)).await {
            warn!(error = %err, "failed to persist audit log");
        }
    });
}

/// Draw a display id, redrawing past any id still in the retained window.
/// The window is far smaller than the id space, so this terminates quickly;
/// history dedupe does not depend on it, it only keeps visible ids distinct.
fn draw_run_id(rng: &mut StdRng, retained: &[TestRun]) -> String {
    loop {
        let candidate = format!("T-{}", rng.gen_range(100..1000));
        if !retained.iter().any(|run| run.id == candidate) {
            return candidate;
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
