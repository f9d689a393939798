//! ---
//! tb_section: "03-reporting"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Printable PDF renderer for the trip-test report."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Minimal PDF 1.4 assembler: uncompressed content streams, the two built-in
//! Helvetica fonts, and a hand-built xref table. Enough for bordered tables
//! of text, which is everything the trip-test report needs.

use chrono::NaiveDate;

use crate::aggregate::{ReportDocument, TestDetailRow};

const PAGE_WIDTH: f64 = 595.28;
const PAGE_HEIGHT: f64 = 841.89;
const MARGIN: f64 = 30.0;
const ROW_HEIGHT: f64 = 18.0;
const BODY_FONT_SIZE: f64 = 9.0;
const TITLE_FONT_SIZE: f64 = 18.0;
const CELL_PAD: f64 = 3.0;
const FOOTER_Y: f64 = MARGIN - 12.0;

const TRIP_TABLE_FRACTIONS: [f64; 8] = [8.0, 10.0, 12.0, 10.0, 15.0, 15.0, 15.0, 15.0];
const METRICS_FRACTIONS: [f64; 3] = [30.0, 30.0, 40.0];
const FAILED_FRACTIONS: [f64; 4] = [30.0, 30.0, 20.0, 20.0];
const RECENT_FRACTIONS: [f64; 3] = [30.0, 30.0, 40.0];
const SIGNOFF_FRACTIONS: [f64; 4] = [30.0, 20.0, 30.0, 20.0];

/// Download name carries the generation date, e.g.
/// `mcb_trip_test_report_2026-08-30.pdf`.
pub fn pdf_export_filename(date: NaiveDate) -> String {
    format!("mcb_trip_test_report_{date}.pdf")
}

/// Render the report document to complete PDF bytes. Row overflow paginates;
/// empty tables render their placeholder row instead of collapsing.
pub fn render_pdf(doc: &ReportDocument) -> Vec<u8> {
    let mut renderer = Renderer::new();

    renderer.title(&doc.header.title);

    let trip_header = [
        "S.No",
        "Type",
        "Number of poles",
        "Rating (A)",
        "Expected Trip time",
        "Actual trip time",
        "Trip Time in curve",
        "catalogue number",
    ];
    renderer.table_header(&TRIP_TABLE_FRACTIONS, &trip_header);
    if doc.trip_rows.is_empty() {
        renderer.placeholder_row("No test data available");
    } else {
        for row in &doc.trip_rows {
            let serial = row.serial.to_string();
            renderer.table_row(
                &TRIP_TABLE_FRACTIONS,
                &[
                    serial.as_str(),
                    row.mcb_type.as_str(),
                    row.poles.as_str(),
                    row.rating_amps.as_str(),
                    row.expected_trip.as_str(),
                    row.actual_trip.as_str(),
                    row.trip_curve.as_str(),
                    row.catalogue_no.as_str(),
                ],
            );
        }
    }
    renderer.gap(10.0);

    renderer.metric_boxes(&[
        ("Current (A):", doc.header.current_a.as_str()),
        ("Voltage (V):", doc.header.voltage.as_str()),
    ]);
    renderer.gap(10.0);

    renderer.section_title("Test Metrics");
    renderer.table_header(&METRICS_FRACTIONS, &["Metric", "Value", "Interpretation"]);
    let metric_rows = [
        ("Test Status (Latest)", doc.metrics.latest_status.clone()),
        (
            "Risk Analysis (Failure Rate)",
            format!("{}%", doc.metrics.failure_risk_pct),
        ),
        ("Failed Tests (Recent)", doc.metrics.failed_tests.to_string()),
        ("Total Tests Today", doc.metrics.total_tests.to_string()),
        (
            "Real-time Peak Current",
            format!("{:.1} A", doc.metrics.peak_current_a),
        ),
    ];
    for (label, value) in &metric_rows {
        renderer.table_row(&METRICS_FRACTIONS, &[label, value.as_str(), ""]);
    }
    renderer.gap(10.0);

    renderer.section_title("Failed Tests");
    renderer.table_header(
        &FAILED_FRACTIONS,
        &["Test ID", "MCB Type", "Peak Current", "Status (Source)"],
    );
    if doc.failed.is_empty() {
        renderer.placeholder_row("No failed tests");
    } else {
        for row in &doc.failed {
            renderer.table_row(&FAILED_FRACTIONS, &failed_cells(row));
        }
    }
    renderer.gap(10.0);

    renderer.section_title("Recent Tests");
    renderer.table_header(&RECENT_FRACTIONS, &["Test ID", "Result", "Peak Current"]);
    if doc.recent.is_empty() {
        renderer.placeholder_row("No recent tests");
    } else {
        for row in &doc.recent {
            renderer.table_row(
                &RECENT_FRACTIONS,
                &[
                    row.test_id.as_str(),
                    row.status.as_str(),
                    row.peak_current.as_str(),
                ],
            );
        }
    }
    renderer.gap(10.0);

    renderer.section_title("Tested By");
    renderer.table_header(
        &SIGNOFF_FRACTIONS,
        &["Name", "Date", "Reviewed By", "Result"],
    );
    let signoff_date = doc.tested_by.date.to_string();
    renderer.table_row(
        &SIGNOFF_FRACTIONS,
        &[
            doc.tested_by.name.as_str(),
            signoff_date.as_str(),
            doc.tested_by.reviewed_by.as_str(),
            doc.tested_by.result.as_str(),
        ],
    );

    renderer.finish(&format!("Date: {}", doc.header.date))
}

fn failed_cells(row: &TestDetailRow) -> [&str; 4] {
    [
        row.test_id.as_str(),
        row.mcb_type.as_str(),
        row.peak_current.as_str(),
        row.status.as_str(),
    ]
}

struct Renderer {
    pages: Vec<String>,
    content: String,
    cursor_y: f64,
}

impl Renderer {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            content: String::new(),
            cursor_y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn content_width() -> f64 {
        PAGE_WIDTH - 2.0 * MARGIN
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.content));
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, height: f64) {
        if self.cursor_y - height < MARGIN {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f64) {
        self.cursor_y -= height;
    }

    fn title(&mut self, text: &str) {
        self.ensure_space(TITLE_FONT_SIZE + 16.0);
        self.cursor_y -= TITLE_FONT_SIZE;
        let width = approx_text_width(text, TITLE_FONT_SIZE);
        let x = (PAGE_WIDTH - width) / 2.0;
        self.text(x, self.cursor_y, TITLE_FONT_SIZE, true, text);
        // underline
        self.line(x, self.cursor_y - 2.0, x + width, self.cursor_y - 2.0);
        self.cursor_y -= 16.0;
    }

    fn section_title(&mut self, text: &str) {
        self.ensure_space(ROW_HEIGHT);
        self.cursor_y -= ROW_HEIGHT;
        self.text(MARGIN, self.cursor_y + CELL_PAD, 11.0, true, text);
    }

    fn table_header(&mut self, fractions: &[f64], cells: &[&str]) {
        self.row(fractions, cells, true);
    }

    fn table_row(&mut self, fractions: &[f64], cells: &[&str]) {
        self.row(fractions, cells, false);
    }

    /// Full-width bordered row used when a table has no data.
    fn placeholder_row(&mut self, text: &str) {
        self.ensure_space(ROW_HEIGHT);
        self.cursor_y -= ROW_HEIGHT;
        self.rect(MARGIN, self.cursor_y, Self::content_width(), ROW_HEIGHT);
        let width = approx_text_width(text, BODY_FONT_SIZE);
        let x = MARGIN + (Self::content_width() - width) / 2.0;
        self.text(x, self.cursor_y + ROW_HEIGHT / 2.0 - 3.0, BODY_FONT_SIZE, false, text);
    }

    fn row(&mut self, fractions: &[f64], cells: &[&str], bold: bool) {
        debug_assert_eq!(fractions.len(), cells.len());
        debug_assert!(fractions.iter().sum::<f64>() <= 100.0 + f64::EPSILON);
        self.ensure_space(ROW_HEIGHT);
        self.cursor_y -= ROW_HEIGHT;
        let mut x = MARGIN;
        for (fraction, cell) in fractions.iter().zip(cells) {
            let cell_width = Self::content_width() * fraction / 100.0;
            self.rect(x, self.cursor_y, cell_width, ROW_HEIGHT);
            let text = clip_to_width(cell, cell_width - 2.0 * CELL_PAD, BODY_FONT_SIZE);
            self.text(
                x + CELL_PAD,
                self.cursor_y + ROW_HEIGHT / 2.0 - 3.0,
                BODY_FONT_SIZE,
                bold,
                &text,
            );
            x += cell_width;
        }
    }

    /// Side-by-side outlined boxes, label above value.
    fn metric_boxes(&mut self, boxes: &[(&str, &str)]) {
        let box_height = 2.0 * ROW_HEIGHT;
        self.ensure_space(box_height);
        self.cursor_y -= box_height;
        let box_width = Self::content_width() * 0.48;
        let spacing = Self::content_width() - box_width * boxes.len() as f64;
        let step = if boxes.len() > 1 {
            box_width + spacing / (boxes.len() as f64 - 1.0)
        } else {
            box_width
        };
        for (i, (label, value)) in boxes.iter().enumerate() {
            let x = MARGIN + step * i as f64;
            self.rect(x, self.cursor_y, box_width, box_height);
            self.text(x + CELL_PAD, self.cursor_y + box_height - 12.0, BODY_FONT_SIZE, true, label);
            self.text(x + CELL_PAD, self.cursor_y + 6.0, 10.0, false, value);
        }
    }

    fn text(&mut self, x: f64, y: f64, size: f64, bold: bool, text: &str) {
        let font = if bold { "/F2" } else { "/F1" };
        self.content.push_str(&format!(
            "BT {font} {size:.1} Tf 1 0 0 1 {x:.2} {y:.2} Tm ({}) Tj ET\n",
            escape_pdf_text(text)
        ));
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.content
            .push_str(&format!("{x:.2} {y:.2} {w:.2} {h:.2} re S\n"));
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.content
            .push_str(&format!("{x1:.2} {y1:.2} m {x2:.2} {y2:.2} l S\n"));
    }

    /// Stamp footers and assemble the final byte stream.
    fn finish(mut self, footer_left: &str) -> Vec<u8> {
        self.pages.push(std::mem::take(&mut self.content));
        let total = self.pages.len();
        for (i, page) in self.pages.iter_mut().enumerate() {
            let right = format!("Page {} of {}", i + 1, total);
            let right_x = PAGE_WIDTH - MARGIN - approx_text_width(&right, BODY_FONT_SIZE);
            page.push_str(&format!(
                "BT /F2 9.0 Tf 1 0 0 1 {MARGIN:.2} {FOOTER_Y:.2} Tm ({}) Tj ET\n",
                escape_pdf_text(footer_left)
            ));
            page.push_str(&format!(
                "BT /F2 9.0 Tf 1 0 0 1 {right_x:.2} {FOOTER_Y:.2} Tm ({}) Tj ET\n",
                escape_pdf_text(&right)
            ));
        }
        assemble(&self.pages)
    }
}

/// Object layout: 1 catalog, 2 page tree, 3/4 fonts, then one page object
/// plus one content stream per page.
fn assemble(pages: &[String]) -> Vec<u8> {
    let page_count = pages.len();
    let mut objects: Vec<String> = Vec::with_capacity(4 + page_count * 2);

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 5 + i * 2))
        .collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_owned());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {page_count} >>",
        kids.join(" ")
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_owned());
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold >>".to_owned());

    for (i, content) in pages.iter().enumerate() {
        let stream_obj = 6 + i * 2;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH:.2} {PAGE_HEIGHT:.2}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {stream_obj} 0 R >>"
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}endstream",
            content.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
    }
    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    out.push_str("0000000000 65535 f \n");
    for offset in offsets {
        out.push_str(&format!("{offset:010} 00000 n \n"));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));
    out.into_bytes()
}

fn escape_pdf_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            c if c.is_ascii() && !c.is_control() => escaped.push(c),
            // Helvetica with the default encoding only covers ASCII here.
            _ => escaped.push('?'),
        }
    }
    escaped
}

/// Rough Helvetica advance: average glyph is about half the point size.
fn approx_text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * 0.5
}

fn clip_to_width(text: &str, width: f64, size: f64) -> String {
    let max_chars = (width / (size * 0.5)).floor() as usize;
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    text.chars().take(max_chars).collect()
}
