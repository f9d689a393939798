//! ---
//! tb_section: "06-testing-qa"
//! tb_subsection: "integration-tests"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Integration tests for CSV and PDF exports."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::io::Write;

use chrono::{NaiveDate, TimeZone, Utc};
use tripbench_model::{McbType, RunResult, TestRun};
use tripbench_report::{build_report, render_pdf, write_runs_csv};

fn run(id: &str, mcb_type: McbType, result: RunResult, peak: f64, duration: f64) -> TestRun {
    TestRun {
        id: id.to_owned(),
        mcb_type,
        fault_current_ka: 10.0,
        power_factor: 0.9,
        rating_amps: 80,
        voltage: 230.0,
        result: Some(result),
        peak_current_a: Some(peak),
        duration_seconds: Some(duration),
        created_at: Utc.with_ymd_and_hms(2026, 8, 30, 9, 30, 0).unwrap(),
    }
}

fn window() -> Vec<TestRun> {
    vec![
        run("T-310", McbType::D, RunResult::Fail, 244.8, 4.2),
        run("T-309", McbType::C, RunResult::Pass, 188.1, 2.9),
        run("T-308", McbType::B, RunResult::Pass, 152.4, 2.6),
    ]
}

#[test]
fn csv_rows_parse_back_to_the_source_values() {
    let runs = window();
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    {
        let mut bytes = Vec::new();
        write_runs_csv(&runs, &mut bytes).expect("csv renders");
        file.write_all(&bytes).expect("write");
        file.flush().expect("flush");
    }

    let mut reader = csv::Reader::from_path(file.path()).expect("reopen csv");
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.get(3), Some("Peak Current (A)"));

    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("rows parse");
    assert_eq!(rows.len(), runs.len());
    for (row, source) in rows.iter().zip(&runs) {
        assert_eq!(row.get(0), Some(source.id.as_str()));
        assert_eq!(row.get(1), Some(source.mcb_type.as_str()));
        let peak: f64 = row.get(3).unwrap().parse().expect("numeric peak");
        assert_eq!(Some(peak), source.peak_current_a);
        let duration: f64 = row.get(5).unwrap().parse().expect("numeric duration");
        assert_eq!(Some(duration), source.duration_seconds);
    }
}

#[test]
fn report_metrics_match_the_run_window() {
    let runs = window();
    let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
    let report = build_report(&runs, 244.8, date);

    assert_eq!(report.metrics.total_tests, 3);
    assert_eq!(report.metrics.failed_tests, 1);
    assert_eq!(report.metrics.failure_risk_pct, 33);
    assert_eq!(report.metrics.latest_status, "Fail");
    assert_eq!(report.trip_rows.len(), 3);
    assert_eq!(report.trip_rows[0].serial, 1);
    assert_eq!(report.trip_rows[0].catalogue_no, "T-310");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.recent.len(), 3);
}

#[test]
fn rendered_pdf_contains_every_window_run() {
    let runs = window();
    let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
    let report = build_report(&runs, 244.8, date);
    let text = String::from_utf8(render_pdf(&report)).expect("pdf is ascii");

    assert!(text.starts_with("%PDF-1.4"));
    for source in &runs {
        assert!(text.contains(&source.id), "missing run {}", source.id);
    }
    assert!(text.contains("Test Metrics"));
    assert!(text.contains("Date: 2026-08-30"));
}

#[test]
fn large_windows_paginate_instead_of_overflowing() {
    let runs: Vec<TestRun> = (0..80)
        .map(|i| {
            run(
                &format!("T-{}", 100 + i),
                McbType::B,
                RunResult::Pass,
                150.0,
                2.5,
            )
        })
        .collect();
    let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
    let report = build_report(&runs, 150.0, date);
    let text = String::from_utf8(render_pdf(&report)).expect("pdf is ascii");

    assert!(text.contains("Page 1 of 2") || text.contains("Page 1 of 3"));
    assert!(text.contains("T-179"));
}
