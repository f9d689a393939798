//! ---
//! tb_section: "02-data-model-gateway"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Domain types shared across the dashboard runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Domain types for the TripBench workspace: trip-test runs, telemetry
//! samples, audit records, scheduling rows, and run-configuration validation.

pub mod run;
pub mod telemetry;
pub mod validate;

pub use run::{ActivityLogEntry, LogKind, McbType, RunResult, RunStatus, ScheduleEntry, TestRun};
pub use telemetry::TelemetrySample;
pub use validate::{ConfigField, ConfigValidationError, FieldError, RunConfig};
