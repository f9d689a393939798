//! ---
//! tb_section: "02-data-model-gateway"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Remote data gateway abstraction and in-memory backend."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use tripbench_model::{ActivityLogEntry, ScheduleEntry, TelemetrySample, TestRun};

use crate::{DataGateway, GatewayError, GatewayResult};

const FEED_CAPACITY: usize = 256;

/// In-memory stand-in for the hosted relational store. Tables are append-only
/// vectors in insertion order; each insert is echoed onto the table's change
/// feed, so subscribers observe the same event stream a remote backend would
/// push.
///
/// `set_offline(true)` makes every query and insert fail with
/// [`GatewayError::Unavailable`], which is how outage handling is exercised.
pub struct InMemoryGateway {
    runs: RwLock<Vec<TestRun>>,
    logs: RwLock<Vec<ActivityLogEntry>>,
    telemetry: RwLock<Vec<TelemetrySample>>,
    schedule: RwLock<Vec<ScheduleEntry>>,
    offline: AtomicBool,
    runs_tx: broadcast::Sender<TestRun>,
    logs_tx: broadcast::Sender<ActivityLogEntry>,
    telemetry_tx: broadcast::Sender<TelemetrySample>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (runs_tx, _) = broadcast::channel(FEED_CAPACITY);
        let (logs_tx, _) = broadcast::channel(FEED_CAPACITY);
        let (telemetry_tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            runs: RwLock::new(Vec::new()),
            logs: RwLock::new(Vec::new()),
            telemetry: RwLock::new(Vec::new()),
            schedule: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
            runs_tx,
            logs_tx,
            telemetry_tx,
        }
    }

    /// Simulate a backend outage. While offline every operation returns
    /// [`GatewayError::Unavailable`]; stored rows are retained.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        debug!(offline, "in-memory gateway availability toggled");
    }

    /// Replace the upcoming-test schedule. The schedule table has no change
    /// feed; it is only bulk-read.
    pub fn set_schedule(&self, entries: Vec<ScheduleEntry>) {
        *self.schedule.write() = entries;
    }

    /// Pre-populate tables without emitting change-feed events, as a remote
    /// store would already contain history at session start.
    pub fn preload(
        &self,
        runs: Vec<TestRun>,
        logs: Vec<ActivityLogEntry>,
        telemetry: Vec<TelemetrySample>,
    ) {
        *self.runs.write() = runs;
        *self.logs.write() = logs;
        *self.telemetry.write() = telemetry;
    }

    fn check_online(&self, op: &str) -> GatewayResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(format!(
                "in-memory gateway offline during {op}"
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGateway")
            .field("runs", &self.runs.read().len())
            .field("logs", &self.logs.read().len())
            .field("telemetry", &self.telemetry.read().len())
            .field("offline", &self.offline.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DataGateway for InMemoryGateway {
    async fn recent_runs(&self, limit: usize) -> GatewayResult<Vec<TestRun>> {
        self.check_online("recent_runs")?;
        let runs = self.runs.read();
        Ok(runs.iter().rev().take(limit).cloned().collect())
    }

    async fn recent_logs(&self, limit: usize) -> GatewayResult<Vec<ActivityLogEntry>> {
        self.check_online("recent_logs")?;
        let logs = self.logs.read();
        Ok(logs.iter().rev().take(limit).cloned().collect())
    }

    async fn telemetry_window(&self, limit: usize) -> GatewayResult<Vec<TelemetrySample>> {
        self.check_online("telemetry_window")?;
        let telemetry = self.telemetry.read();
        let skip = telemetry.len().saturating_sub(limit);
        Ok(telemetry.iter().skip(skip).cloned().collect())
    }

    async fn schedule(&self, limit: usize) -> GatewayResult<Vec<ScheduleEntry>> {
        self.check_online("schedule")?;
        let mut entries: Vec<ScheduleEntry> = self.schedule.read().clone();
        entries.sort_by_key(|entry| entry.scheduled_date);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn insert_run(&self, run: TestRun) -> GatewayResult<()> {
        self.check_online("insert_run")?;
        // Only completed runs are persisted; in-flight state never leaves the
        // dashboard session.
        if run.result.is_none() {
            return Err(GatewayError::Rejected {
                table: "test_runs",
                reason: format!("run {} has no recorded result", run.id),
            });
        }
        self.runs.write().push(run.clone());
        // A send error only means nobody is subscribed.
        let _ = self.runs_tx.send(run);
        Ok(())
    }

    async fn insert_log(&self, entry: ActivityLogEntry) -> GatewayResult<()> {
        self.check_online("insert_log")?;
        self.logs.write().push(entry.clone());
        let _ = self.logs_tx.send(entry);
        Ok(())
    }

    async fn insert_telemetry(&self, samples: Vec<TelemetrySample>) -> GatewayResult<()> {
        self.check_online("insert_telemetry")?;
        self.telemetry.write().extend(samples.iter().cloned());
        for sample in samples {
            let _ = self.telemetry_tx.send(sample);
        }
        Ok(())
    }

    fn subscribe_runs(&self) -> broadcast::Receiver<TestRun> {
        self.runs_tx.subscribe()
    }

    fn subscribe_logs(&self) -> broadcast::Receiver<ActivityLogEntry> {
        self.logs_tx.subscribe()
    }

    fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetrySample> {
        self.telemetry_tx.subscribe()
    }
}
