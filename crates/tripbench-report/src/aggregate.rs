//! ---
//! tb_section: "03-reporting"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Derives the trip-test report document from a run window."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use chrono::NaiveDate;
use serde::Serialize;

use tripbench_model::TestRun;

const REPORT_TITLE: &str = "MCB TRIP TEST REPORT";
const DEFAULT_VOLTAGE: f64 = 230.0;
const DEFAULT_RATING_AMPS: u32 = 63;
const DETAIL_ROW_LIMIT: usize = 3;

/// Expected trip time is estimated as a fixed fraction of the measured time.
const EXPECTED_TRIP_FRACTION: f64 = 0.9;

/// Header block shown at the top of the rendered report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportHeader {
    pub title: String,
    pub date: NaiveDate,
    pub current_a: String,
    pub voltage: String,
}

/// One line of the main trip-test table. All fields are pre-formatted; blank
/// strings stand in for measurements a run never produced.
#[derive(Debug, Clone, Serialize)]
pub struct TripRow {
    pub serial: u32,
    pub mcb_type: String,
    pub poles: String,
    pub rating_amps: String,
    pub expected_trip: String,
    pub actual_trip: String,
    pub trip_curve: String,
    pub catalogue_no: String,
}

/// Derived figures for the metrics table.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetrics {
    pub latest_status: String,
    pub failure_risk_pct: u8,
    pub failed_tests: usize,
    pub total_tests: usize,
    pub peak_current_a: f64,
}

/// One line of the failed-tests or recent-tests detail tables.
#[derive(Debug, Clone, Serialize)]
pub struct TestDetailRow {
    pub test_id: String,
    pub mcb_type: String,
    pub peak_current: String,
    pub status: String,
}

/// Sign-off block at the bottom of the report.
#[derive(Debug, Clone, Serialize)]
pub struct TestedBy {
    pub name: String,
    pub date: NaiveDate,
    pub reviewed_by: String,
    pub result: String,
}

/// Complete renderer-independent report payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub header: ReportHeader,
    pub trip_rows: Vec<TripRow>,
    pub metrics: ReportMetrics,
    pub failed: Vec<TestDetailRow>,
    pub recent: Vec<TestDetailRow>,
    pub tested_by: TestedBy,
}

/// Derive the report from the retained run window, newest first. An empty
/// window still yields a well-formed document; renderers substitute
/// placeholder rows for the empty tables.
pub fn build_report(runs: &[TestRun], peak_current_a: f64, generated_on: NaiveDate) -> ReportDocument {
    let total = runs.len();
    let passes = runs.iter().filter(|run| run.is_pass()).count();
    let failed_count = runs.iter().filter(|run| run.is_fail()).count();
    let pass_rate = if total == 0 {
        0
    } else {
        ((passes as f64 / total as f64) * 100.0).round() as u8
    };

    let voltage = runs.first().map(|run| run.voltage).unwrap_or(DEFAULT_VOLTAGE);
    let header = ReportHeader {
        title: REPORT_TITLE.to_owned(),
        date: generated_on,
        current_a: format!("{}", peak_current_a.round() as i64),
        voltage: format!("{}", voltage.round() as i64),
    };

    let trip_rows = runs
        .iter()
        .enumerate()
        .map(|(i, run)| trip_row(i as u32 + 1, run))
        .collect();

    let latest_status = runs
        .first()
        .and_then(|run| run.result)
        .map(|result| result.label().to_owned())
        .unwrap_or_else(|| "In Progress".to_owned());

    let metrics = ReportMetrics {
        latest_status,
        failure_risk_pct: 100 - pass_rate.min(100),
        failed_tests: failed_count,
        total_tests: total,
        peak_current_a,
    };

    let failed = runs
        .iter()
        .filter(|run| run.is_fail())
        .take(DETAIL_ROW_LIMIT)
        .map(detail_row)
        .collect();
    let recent = runs.iter().take(DETAIL_ROW_LIMIT).map(detail_row).collect();

    let tested_by = TestedBy {
        name: runs
            .first()
            .map(|run| format!("Operator ({})", run.id))
            .unwrap_or_else(|| "Automated System".to_owned()),
        date: generated_on,
        reviewed_by: "QA Team".to_owned(),
        result: metrics.latest_status.clone(),
    };

    ReportDocument {
        header,
        trip_rows,
        metrics,
        failed,
        recent,
        tested_by,
    }
}

fn trip_row(serial: u32, run: &TestRun) -> TripRow {
    let rating = run
        .peak_current_a
        .map(|peak| peak.round() as i64)
        .unwrap_or(i64::from(DEFAULT_RATING_AMPS));
    let (expected, actual, curve) = match run.duration_seconds {
        Some(duration) => (
            format!("{:.2}s", duration * EXPECTED_TRIP_FRACTION),
            format!("{duration}s"),
            if duration < 1.0 { "Fast" } else { "Normal" }.to_owned(),
        ),
        None => (String::new(), String::new(), String::new()),
    };
    TripRow {
        serial,
        mcb_type: run.mcb_type.to_string(),
        poles: "2".to_owned(),
        rating_amps: rating.to_string(),
        expected_trip: expected,
        actual_trip: actual,
        trip_curve: curve,
        catalogue_no: run.id.clone(),
    }
}

fn detail_row(run: &TestRun) -> TestDetailRow {
    TestDetailRow {
        test_id: run.id.clone(),
        mcb_type: run.mcb_type.to_string(),
        peak_current: run
            .peak_current_a
            .map(|peak| format!("{peak:.1} A"))
            .unwrap_or_default(),
        status: run
            .result
            .map(|result| result.label().to_owned())
            .unwrap_or_default(),
    }
}
