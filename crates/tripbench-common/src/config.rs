//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Shared primitives and utilities for the dashboard runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_recent_runs_cap() -> usize {
    10
}

fn default_activity_cap() -> usize {
    50
}

fn default_live_capacity() -> usize {
    200
}

fn default_opening_capacity() -> usize {
    500
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(400)
}

fn default_progress_step() -> u8 {
    15
}

fn default_run_duration() -> Duration {
    Duration::from_millis(3000)
}

fn default_pass_bias() -> f64 {
    0.7
}

fn default_simulator_seed() -> u64 {
    0xBE7C4u64
}

fn default_livefeed_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default api address")
}

/// Primary configuration object for the TripBench runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub livefeed: LivefeedConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "TRIPBENCH_CONFIG";

    /// Load configuration from disk, respecting the `TRIPBENCH_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.dashboard.validate()?;
        self.simulator.validate()?;
        self.livefeed.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Window and buffer sizing for the dashboard session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_recent_runs_cap")]
    pub recent_runs_cap: usize,
    #[serde(default = "default_activity_cap")]
    pub activity_cap: usize,
    #[serde(default = "default_live_capacity")]
    pub live_capacity: usize,
    #[serde(default = "default_opening_capacity")]
    pub opening_capacity: usize,
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.recent_runs_cap == 0 {
            return Err(anyhow!("dashboard.recent_runs_cap must be at least 1"));
        }
        if self.activity_cap == 0 {
            return Err(anyhow!("dashboard.activity_cap must be at least 1"));
        }
        if self.live_capacity == 0 || self.opening_capacity == 0 {
            return Err(anyhow!("telemetry buffer capacities must be at least 1"));
        }
        Ok(())
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_runs_cap: default_recent_runs_cap(),
            activity_cap: default_activity_cap(),
            live_capacity: default_live_capacity(),
            opening_capacity: default_opening_capacity(),
        }
    }
}

/// Timing and outcome parameters for the trip-test run simulator.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_progress_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub progress_interval: Duration,
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
    #[serde(default = "default_run_duration")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub run_duration: Duration,
    #[serde(default = "default_pass_bias")]
    pub pass_bias: f64,
    #[serde(default = "default_simulator_seed")]
    pub random_seed: u64,
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval.is_zero() || self.run_duration.is_zero() {
            return Err(anyhow!("simulator intervals must be positive"));
        }
        if self.progress_step == 0 || self.progress_step > 100 {
            return Err(anyhow!("simulator.progress_step must be within 1..=100"));
        }
        if !(0.0..=1.0).contains(&self.pass_bias) {
            return Err(anyhow!("simulator.pass_bias must be within [0, 1]"));
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            progress_step: default_progress_step(),
            run_duration: default_run_duration(),
            pass_bias: default_pass_bias(),
            random_seed: default_simulator_seed(),
        }
    }
}

/// Cadence of the synthetic live-current feed emitted while a run is active.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivefeedConfig {
    #[serde(default = "default_livefeed_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
    #[serde(default = "default_simulator_seed")]
    pub random_seed: u64,
}

impl LivefeedConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(anyhow!("livefeed.interval must be positive"));
        }
        Ok(())
    }
}

impl Default for LivefeedConfig {
    fn default() -> Self {
        Self {
            interval: default_livefeed_interval(),
            random_seed: default_simulator_seed(),
        }
    }
}

/// HTTP API listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
        }
    }
}

/// Logging output settings consumed by [`crate::logging::init_tracing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
