//! ---
//! tb_section: "05-daemon"
//! tb_subsection: "binary"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Binary entrypoint for the TripBench daemon."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use tripbench_api::{spawn_api_server, ApiServer, ApiState};
use tripbench_common::config::AppConfig;
use tripbench_common::logging::init_tracing;
use tripbench_core::{spawn_livefeed, DashboardStore, FallbackDataset, RunSimulator};
use tripbench_gateway::InMemoryGateway;
use tripbench_report::{
    build_report, csv_export_filename, pdf_export_filename, render_pdf, write_runs_csv,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "TripBench daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Preload the gateway with the built-in demo dataset")]
    seed_demo_data: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the dashboard runtime")]
    Run,
    #[command(about = "Write the test-results CSV and exit")]
    ExportCsv {
        #[arg(long, value_name = "FILE", help = "Output path for the CSV file")]
        out: Option<PathBuf>,
    },
    #[command(about = "Write the trip-test PDF report and exit")]
    ExportReport {
        #[arg(long, value_name = "FILE", help = "Output path for the PDF file")]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.prod.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let config = match AppConfig::load_with_source(&candidates) {
        Ok(loaded) => {
            let config = loaded.config;
            init_tracing("tripbenchd", &config.logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
            config
        }
        Err(err) => {
            let config = AppConfig::default();
            init_tracing("tripbenchd", &config.logging)?;
            warn!(error = %err, "no configuration file found; using defaults");
            config
        }
    };

    let gateway = Arc::new(InMemoryGateway::new());
    if cli.seed_demo_data {
        seed_demo_data(&gateway);
        info!("gateway preloaded with demo dataset");
    }

    let store = DashboardStore::new(gateway, config.dashboard.clone());
    store.load_initial().await;
    if store.is_degraded() {
        warn!("initial load degraded; dashboard is serving fallback data");
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config, store).await,
        Commands::ExportCsv { out } => export_csv(&store, out),
        Commands::ExportReport { out } => export_report(&store, out),
    }
}

async fn run_daemon(config: AppConfig, store: Arc<DashboardStore>) -> Result<()> {
    let (shutdown_tx, _) = broadcast::channel(4);
    let feed_task = store.spawn_feed_task(shutdown_tx.subscribe());
    let livefeed_task = spawn_livefeed(
        Arc::clone(&store),
        config.livefeed.clone(),
        shutdown_tx.subscribe(),
    );
    let simulator = Arc::new(RunSimulator::new(
        Arc::clone(&store),
        config.simulator.clone(),
    ));

    let mut api_server: Option<ApiServer> = None;
    if config.api.enabled {
        let state = Arc::new(ApiState::new(Arc::clone(&store), simulator));
        match spawn_api_server(state, config.api.listen) {
            Ok(server) => {
                info!(address = %server.addr(), "api server listening");
                api_server = Some(server);
            }
            Err(err) => {
                warn!(error = %err, "failed to start api server");
            }
        }
    } else {
        info!("api server disabled by configuration");
    }

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    let _ = shutdown_tx.send(());
    if let Some(server) = api_server {
        server.shutdown().await?;
    }
    let _ = livefeed_task.await;
    let _ = feed_task.await;

    Ok(())
}

fn export_csv(store: &DashboardStore, out: Option<PathBuf>) -> Result<()> {
    let path = out.unwrap_or_else(|| PathBuf::from(csv_export_filename()));
    let runs = store.runs();
    let mut bytes = Vec::new();
    write_runs_csv(&runs, &mut bytes)?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("unable to write csv export {}", path.display()))?;
    info!(path = %path.display(), rows = runs.len(), "csv export written");
    Ok(())
}

fn export_report(store: &DashboardStore, out: Option<PathBuf>) -> Result<()> {
    let generated_on = Utc::now().date_naive();
    let path = out.unwrap_or_else(|| PathBuf::from(pdf_export_filename(generated_on)));
    let runs = store.runs();
    let report = build_report(&runs, store.peak_current(), generated_on);
    std::fs::write(&path, render_pdf(&report))
        .with_context(|| format!("unable to write report {}", path.display()))?;
    info!(path = %path.display(), rows = report.trip_rows.len(), "report written");
    Ok(())
}

/// Install the deterministic demo rows directly into the gateway tables so
/// the first bulk load serves them like any remote dataset.
fn seed_demo_data(gateway: &InMemoryGateway) {
    let dataset = FallbackDataset::generate();
    // Tables hold insertion order, oldest first, so bulk reads come back
    // newest-first.
    let mut runs = dataset.runs;
    runs.reverse();
    let mut logs = dataset.logs;
    logs.reverse();
    gateway.preload(runs, logs, dataset.opening_series);
    gateway.set_schedule(dataset.schedule);
}
