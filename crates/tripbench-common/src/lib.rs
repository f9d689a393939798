//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Shared primitives and utilities for the dashboard runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Core shared primitives for the TripBench workspace.
//! This crate exposes configuration loading and logging setup consumed
//! across the workspace.

pub mod config;
pub mod logging;

pub use config::{ApiConfig, AppConfig, DashboardConfig, LivefeedConfig, LoggingConfig, SimulatorConfig};
pub use logging::{init_tracing, LogFormat};
