//! ---
//! tb_section: "03-reporting"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "CSV results-table renderer."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::io::Write;

use anyhow::{Context, Result};
use csv::WriterBuilder;

use tripbench_model::TestRun;

/// Stable download name for the results table.
pub const CSV_EXPORT_FILENAME: &str = "mcb_test_results.csv";

const CSV_HEADER: [&str; 6] = [
    "ID",
    "Type",
    "Result",
    "Peak Current (A)",
    "Timestamp",
    "Duration (s)",
];

pub fn csv_export_filename() -> &'static str {
    CSV_EXPORT_FILENAME
}

/// Render the run window as an RFC 4180 table, one row per run in window
/// order. Fields the run never produced stay empty rather than "0"; the csv
/// writer quotes anything containing commas or quotes.
pub fn write_runs_csv<W: Write>(runs: &[TestRun], writer: W) -> Result<()> {
    let mut out = WriterBuilder::new().has_headers(false).from_writer(writer);
    out.write_record(CSV_HEADER)
        .context("unable to write csv header")?;
    for run in runs {
        let peak = run.peak_current_a.map(fmt_f64).unwrap_or_default();
        let timestamp = run.created_at.to_rfc3339();
        let duration = run.duration_seconds.map(fmt_f64).unwrap_or_default();
        out.write_record([
            run.id.as_str(),
            run.mcb_type.as_str(),
            run.result.map(|result| result.as_str()).unwrap_or(""),
            peak.as_str(),
            timestamp.as_str(),
            duration.as_str(),
        ])
        .with_context(|| format!("unable to write csv row for run {}", run.id))?;
    }
    out.flush().context("unable to flush csv output")?;
    Ok(())
}

fn fmt_f64(value: f64) -> String {
    format!("{value}")
}
