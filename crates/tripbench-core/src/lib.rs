//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Aggregate state store and run simulation for the dashboard."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Core dashboard runtime: the aggregate session store reconciling bulk
//! loads, change-feed events, and local run completions; the bounded
//! telemetry buffers behind the charts; the timed run simulator; and the
//! degraded-mode fallback dataset.

pub mod livefeed;
pub mod seed;
pub mod simulator;
pub mod store;
pub mod telemetry;

pub use livefeed::{spawn_livefeed, LiveSignal};
pub use seed::FallbackDataset;
pub use simulator::{RunHandle, RunSimulator, StartError};
pub use store::{DashboardStore, Overview, RiskItem, Severity};
pub use telemetry::TelemetryBuffer;
