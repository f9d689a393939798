//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Periodic synthetic current signal feeding the live chart."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tripbench_common::config::LivefeedConfig;
use tripbench_gateway::DataGateway;
use tripbench_model::{RunStatus, TelemetrySample};

use crate::store::DashboardStore;

const BASE_CURRENT_A: f64 = 150.0;
const SWING_CURRENT_A: f64 = 100.0;
const SUPPLY_VOLTAGE: f64 = 230.0;
const NOISE_STD_DEV: f64 = 4.0;

/// Deterministic synthetic current waveform: a slow sine swing around the
/// bench's nominal load with Gaussian measurement noise on top.
pub struct LiveSignal {
    rng: StdRng,
    noise: Normal<f64>,
    elapsed_ms: u64,
    step_ms: u64,
}

impl LiveSignal {
    pub fn new(seed: u64, step_ms: u64) -> Self {
        let noise = Normal::new(0.0, NOISE_STD_DEV).expect("constant std dev is positive");
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise,
            elapsed_ms: 0,
            step_ms: step_ms.max(1),
        }
    }

    /// Advance the waveform by one tick and emit the sample for it.
    pub fn next_sample(&mut self) -> TelemetrySample {
        let t = self.elapsed_ms as f64;
        let current =
            BASE_CURRENT_A + SWING_CURRENT_A * (0.005 * t).sin() + self.noise.sample(&mut self.rng);
        let sample = TelemetrySample::new(None, self.elapsed_ms, SUPPLY_VOLTAGE, current.max(0.0));
        self.elapsed_ms += self.step_ms;
        sample
    }
}

/// Emit live telemetry through the gateway while a run is active. Samples
/// arrive back at the store via the telemetry change feed, the same path
/// remote rows take.
pub fn spawn_livefeed(
    store: Arc<DashboardStore>,
    config: LivefeedConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let gateway: Arc<dyn DataGateway> = store.gateway();
        let mut signal = LiveSignal::new(config.random_seed, config.interval.as_millis() as u64);
        let mut ticker = tokio::time::interval(config.interval);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("livefeed shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if store.status() != RunStatus::Running {
                        continue;
                    }
                    let sample = signal.next_sample();
                    if let Err(err) = gateway.insert_telemetry(vec![sample]).await {
                        warn!(error = %err, "livefeed sample dropped");
                    }
                }
            }
        }
    })
}
