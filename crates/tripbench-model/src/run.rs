//! ---
//! tb_section: "02-data-model-gateway"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Domain types shared across the dashboard runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MCB tripping-curve family of the device under test. The curve selects the
/// display family only, not a physical control model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum McbType {
    #[default]
    B,
    C,
    D,
}

impl McbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            McbType::B => "B",
            McbType::C => "C",
            McbType::D => "D",
        }
    }
}

impl std::fmt::Display for McbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a completed trip test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Pass,
    Fail,
}

impl RunResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunResult::Pass => "pass",
            RunResult::Fail => "fail",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunResult::Pass => "Pass",
            RunResult::Fail => "Fail",
        }
    }
}

/// Observable state of the run pipeline for one dashboard session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Pass,
    Fail,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Pass | RunStatus::Fail)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Idle => "Ready",
            RunStatus::Running => "Running",
            RunStatus::Pass => "Pass",
            RunStatus::Fail => "Fail",
        }
    }
}

impl From<RunResult> for RunStatus {
    fn from(result: RunResult) -> Self {
        match result {
            RunResult::Pass => RunStatus::Pass,
            RunResult::Fail => RunStatus::Fail,
        }
    }
}

/// One trip-test run, in-flight or completed. The result, peak current, and
/// duration are populated exactly once, on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub mcb_type: McbType,
    pub fault_current_ka: f64,
    pub power_factor: f64,
    pub rating_amps: u32,
    pub voltage: f64,
    #[serde(default)]
    pub result: Option<RunResult>,
    #[serde(default)]
    pub peak_current_a: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl TestRun {
    pub fn is_pass(&self) -> bool {
        matches!(self.result, Some(RunResult::Pass))
    }

    pub fn is_fail(&self) -> bool {
        matches!(self.result, Some(RunResult::Fail))
    }
}

/// Severity classification for audit entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Success,
    Warning,
    Comment,
}

/// Immutable audit record, append-only and displayed most-recent-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub kind: LogKind,
    pub message: String,
    #[serde(default)]
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            detail: detail.into(),
            created_at: Utc::now(),
        }
    }
}

/// One row of the upcoming-test schedule. Consumed read-only by the dashboard
/// and the report header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub mcb_type: McbType,
    pub scheduled_date: NaiveDate,
    pub priority: u8,
    pub status: String,
}
