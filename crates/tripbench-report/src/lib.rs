//! ---
//! tb_section: "03-reporting"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Report aggregation and export renderers."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Turns a window of completed trip-test runs into export artifacts: a
//! derived report document, a CSV results table, and a printable PDF.

pub mod aggregate;
pub mod csv;
pub mod pdf;

pub use aggregate::{
    build_report, ReportDocument, ReportHeader, ReportMetrics, TestDetailRow, TestedBy, TripRow,
};
pub use csv::{csv_export_filename, write_runs_csv, CSV_EXPORT_FILENAME};
pub use pdf::{pdf_export_filename, render_pdf};
