//! ---
//! tb_section: "04-http-surface"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "REST surface for the dashboard runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use tripbench_core::{DashboardStore, Overview, RunSimulator, StartError};
use tripbench_model::{ActivityLogEntry, FieldError, RunConfig, RunStatus, TestRun};
use tripbench_report::{
    build_report, csv_export_filename, pdf_export_filename, render_pdf, write_runs_csv,
};

/// Shared API state exposed to handlers.
pub struct ApiState {
    store: Arc<DashboardStore>,
    simulator: Arc<RunSimulator>,
    start: Instant,
}

impl ApiState {
    pub fn new(store: Arc<DashboardStore>, simulator: Arc<RunSimulator>) -> Self {
        Self {
            store,
            simulator,
            start: Instant::now(),
        }
    }

    fn status(&self) -> StatusResponse {
        StatusResponse {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            uptime_seconds: self.start.elapsed().as_secs(),
            run_status: self.store.status(),
            degraded: self.store.is_degraded(),
        }
    }
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("uptime_seconds", &self.start.elapsed().as_secs())
            .finish_non_exhaustive()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/overview", get(get_overview))
        .route("/api/runs", get(get_runs))
        .route("/api/runs", post(post_run))
        .route("/api/logs", get(get_logs))
        .route("/api/export/csv", get(get_export_csv))
        .route("/api/export/report", get(get_export_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the REST API with graceful shutdown on the returned handle.
pub fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let app = router(state);

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve API listener address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %local_addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %local_addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: String,
    uptime_seconds: u64,
    run_status: RunStatus,
    degraded: bool,
}

#[derive(Debug, Serialize)]
struct RunAck {
    started: bool,
    status: RunStatus,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    errors: Vec<FieldError>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::Invalid(invalid) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: invalid.to_string(),
                errors: invalid.errors,
            },
            StartError::AlreadyRunning => {
                Self::new(StatusCode::CONFLICT, StartError::AlreadyRunning.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
            errors: self.errors,
        });
        (self.status, body).into_response()
    }
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(state.status())
}

async fn get_overview(State(state): State<Arc<ApiState>>) -> Json<Overview> {
    Json(state.store.overview())
}

async fn get_runs(State(state): State<Arc<ApiState>>) -> Json<Vec<TestRun>> {
    Json(state.store.runs())
}

async fn get_logs(State(state): State<Arc<ApiState>>) -> Json<Vec<ActivityLogEntry>> {
    Json(state.store.activity())
}

/// Start a simulated run. The handle is detached: completion lands in the
/// store through the normal change-feed path and is observable via
/// `/api/overview` and `/api/runs`.
async fn post_run(
    State(state): State<Arc<ApiState>>,
    Json(config): Json<RunConfig>,
) -> Result<(StatusCode, Json<RunAck>), ApiError> {
    let handle = state.simulator.start(config)?;
    handle.detach();
    Ok((
        StatusCode::ACCEPTED,
        Json(RunAck {
            started: true,
            status: state.store.status(),
        }),
    ))
}

async fn get_export_csv(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let runs = state.store.runs();
    let mut bytes = Vec::new();
    write_runs_csv(&runs, &mut bytes)
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(attachment("text/csv", csv_export_filename(), bytes))
}

async fn get_export_report(State(state): State<Arc<ApiState>>) -> Response {
    let runs = state.store.runs();
    let report = build_report(&runs, state.store.peak_current(), Utc::now().date_naive());
    let bytes = render_pdf(&report);
    attachment(
        "application/pdf",
        &pdf_export_filename(report.header.date),
        bytes,
    )
}

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tripbench_common::config::{DashboardConfig, SimulatorConfig};
    use tripbench_gateway::InMemoryGateway;

    fn state() -> Arc<ApiState> {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = DashboardStore::new(gateway, DashboardConfig::default());
        let simulator = Arc::new(RunSimulator::new(
            Arc::clone(&store),
            SimulatorConfig {
                progress_interval: Duration::from_millis(5),
                progress_step: 15,
                run_duration: Duration::from_millis(30),
                pass_bias: 0.7,
                random_seed: 1,
            },
        ));
        Arc::new(ApiState::new(store, simulator))
    }

    #[tokio::test]
    async fn status_reports_idle_on_a_fresh_session() {
        let state = state();
        let Json(status) = get_status(State(state)).await;
        assert_eq!(status.run_status, RunStatus::Idle);
        assert!(!status.degraded);
    }

    #[tokio::test]
    async fn invalid_run_config_maps_to_unprocessable_entity() {
        let state = state();
        let bad = RunConfig {
            voltage: -5.0,
            ..RunConfig::default()
        };
        let err = post_run(State(Arc::clone(&state)), Json(bad))
            .await
            .expect_err("must reject");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!err.errors.is_empty());
        assert_eq!(state.store.status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn concurrent_start_maps_to_conflict() {
        let state = state();
        let (code, Json(ack)) = post_run(State(Arc::clone(&state)), Json(RunConfig::default()))
            .await
            .expect("first start accepted");
        assert_eq!(code, StatusCode::ACCEPTED);
        assert!(ack.started);

        let err = post_run(State(Arc::clone(&state)), Json(RunConfig::default()))
            .await
            .expect_err("second start rejected");
        assert_eq!(err.status, StatusCode::CONFLICT);

        // Detached run finishes on its own and frees the slot.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(state.store.status().is_terminal());
    }

    #[tokio::test]
    async fn csv_export_has_attachment_headers() {
        let state = state();
        let response = get_export_csv(State(state)).await.expect("csv renders");
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        assert!(disposition.contains("mcb_test_results.csv"));
    }

    #[tokio::test]
    async fn report_export_is_a_pdf_attachment() {
        let state = state();
        let response = get_export_report(State(state)).await;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        assert_eq!(content_type, "application/pdf");
    }
}
