//! ---
//! tb_section: "02-data-model-gateway"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Remote data gateway abstraction and in-memory backend."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! The hosted backend is the system of record for runs, audit entries, and
//! telemetry; the dashboard reaches it only through [`DataGateway`]. The
//! in-memory backend here stands in for that service in the daemon, demos,
//! and tests, including per-table insert change feeds.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use tripbench_model::{ActivityLogEntry, ScheduleEntry, TelemetrySample, TestRun};

pub use memory::InMemoryGateway;

/// Errors surfaced by gateway operations. Callers never abort on them:
/// reads degrade to fallback data, rejected or failed writes only log.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("table '{table}' rejected row: {reason}")]
    Rejected { table: &'static str, reason: String },
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Query, insert, and change-subscription surface of the remote data store.
///
/// Read operations return bounded windows: runs and logs newest-first,
/// telemetry oldest-first, schedule soonest-first. Change feeds are
/// independent per-table channels; no cross-table ordering is implied.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn recent_runs(&self, limit: usize) -> GatewayResult<Vec<TestRun>>;
    async fn recent_logs(&self, limit: usize) -> GatewayResult<Vec<ActivityLogEntry>>;
    async fn telemetry_window(&self, limit: usize) -> GatewayResult<Vec<TelemetrySample>>;
    async fn schedule(&self, limit: usize) -> GatewayResult<Vec<ScheduleEntry>>;

    async fn insert_run(&self, run: TestRun) -> GatewayResult<()>;
    async fn insert_log(&self, entry: ActivityLogEntry) -> GatewayResult<()>;
    async fn insert_telemetry(&self, samples: Vec<TelemetrySample>) -> GatewayResult<()>;

    fn subscribe_runs(&self) -> broadcast::Receiver<TestRun>;
    fn subscribe_logs(&self) -> broadcast::Receiver<ActivityLogEntry>;
    fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetrySample>;
}
