//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Deterministic fallback dataset for degraded mode."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Deterministic synthetic dataset installed when the initial gateway fetch
//! fails. The dashboard degrades to plausible placeholder data instead of an
//! empty view; the next successful `load_initial` replaces it wholesale.

use chrono::{Duration, NaiveDate, Utc};
use tripbench_model::{
    ActivityLogEntry, LogKind, McbType, RunResult, ScheduleEntry, TelemetrySample, TestRun,
};

const FALLBACK_PEAK_CURRENT_A: f64 = 145.2;

/// Complete degraded-mode payload for one dashboard session.
#[derive(Debug, Clone)]
pub struct FallbackDataset {
    pub runs: Vec<TestRun>,
    pub logs: Vec<ActivityLogEntry>,
    pub live_series: Vec<TelemetrySample>,
    pub opening_series: Vec<TelemetrySample>,
    pub schedule: Vec<ScheduleEntry>,
    pub peak_current_a: f64,
}

impl FallbackDataset {
    pub fn generate() -> Self {
        Self {
            runs: fallback_runs(),
            logs: fallback_logs(),
            live_series: fallback_live_series(),
            opening_series: fallback_opening_series(),
            schedule: fallback_schedule(),
            peak_current_a: FALLBACK_PEAK_CURRENT_A,
        }
    }
}

fn fallback_runs() -> Vec<TestRun> {
    let rows: &[(&str, McbType, f64, f64, u32, f64, RunResult, f64)] = &[
        ("T-108", McbType::B, 6.0, 0.85, 63, 152.4, RunResult::Pass, 2.6),
        ("T-107", McbType::C, 10.0, 0.90, 80, 188.1, RunResult::Pass, 2.9),
        ("T-106", McbType::D, 16.0, 0.80, 100, 240.7, RunResult::Fail, 4.3),
        ("T-105", McbType::B, 20.0, 0.95, 63, 162.8, RunResult::Pass, 2.4),
        ("T-104", McbType::C, 25.0, 0.85, 80, 205.5, RunResult::Fail, 4.8),
        ("T-103", McbType::B, 32.0, 1.00, 63, 149.3, RunResult::Pass, 2.2),
        ("T-102", McbType::D, 6.0, 0.90, 100, 173.9, RunResult::Pass, 3.1),
        ("T-101", McbType::C, 10.0, 0.85, 80, 166.0, RunResult::Pass, 2.7),
    ];
    let base = Utc::now();
    rows.iter()
        .enumerate()
        .map(
            |(i, &(id, mcb_type, fault, pf, rating, peak, result, duration))| TestRun {
                id: id.to_owned(),
                mcb_type,
                fault_current_ka: fault,
                power_factor: pf,
                rating_amps: rating,
                voltage: 230.0,
                result: Some(result),
                peak_current_a: Some(peak),
                duration_seconds: Some(duration),
                created_at: base - Duration::minutes(5 * (i as i64 + 1)),
            },
        )
        .collect()
}

fn fallback_logs() -> Vec<ActivityLogEntry> {
    let rows: &[(LogKind, &str, &str)] = &[
        (LogKind::Success, "Test T-108 completed", "Result: PASS - peak 152.4 A"),
        (LogKind::Success, "Test T-107 completed", "Result: PASS - peak 188.1 A"),
        (LogKind::Warning, "Test T-106 failed", "MCB Type D exceeded threshold"),
        (LogKind::Comment, "Test started", "MCB Type B at 6 kA"),
        (LogKind::Comment, "Bench calibration check", "Reference shunt within tolerance"),
    ];
    rows.iter()
        .map(|&(kind, message, detail)| ActivityLogEntry::new(kind, message, detail))
        .collect()
}

fn fallback_live_series() -> Vec<TelemetrySample> {
    (0..50)
        .map(|i| {
            let t = i as f64;
            let value = (t * 0.3).sin() * 80.0 + 110.0;
            TelemetrySample::new(None, i * 20, 230.0, value)
        })
        .collect()
}

fn fallback_opening_series() -> Vec<TelemetrySample> {
    (0..30)
        .map(|i| {
            let t = i as f64;
            let voltage = 230.0 * (-0.1 * t).exp();
            let current = 500.0 * (-0.15 * t).exp();
            TelemetrySample::new(None, i * 2, voltage, current)
        })
        .collect()
}

fn fallback_schedule() -> Vec<ScheduleEntry> {
    let today = Utc::now().date_naive();
    vec![
        schedule_entry("S-01", McbType::B, today, 3, "queued"),
        schedule_entry("S-02", McbType::C, next_day(today, 1), 2, "queued"),
        schedule_entry("S-03", McbType::D, next_day(today, 2), 1, "draft"),
    ]
}

fn schedule_entry(
    id: &str,
    mcb_type: McbType,
    date: NaiveDate,
    priority: u8,
    status: &str,
) -> ScheduleEntry {
    ScheduleEntry {
        id: id.to_owned(),
        mcb_type,
        scheduled_date: date,
        priority,
        status: status.to_owned(),
    }
}

fn next_day(date: NaiveDate, days: u64) -> NaiveDate {
    date + Duration::days(days as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_runs_are_newest_first_and_completed() {
        let runs = fallback_runs();
        assert_eq!(runs.len(), 8);
        for pair in runs.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
        assert!(runs.iter().all(|run| run.result.is_some()));
    }

    #[test]
    fn fallback_series_are_time_ordered() {
        let dataset = FallbackDataset::generate();
        assert_eq!(dataset.live_series.len(), 50);
        assert_eq!(dataset.opening_series.len(), 30);
        for pair in dataset.live_series.windows(2) {
            assert!(pair[0].time_offset_ms < pair[1].time_offset_ms);
        }
    }

    #[test]
    fn fallback_pass_rate_matches_seeded_outcomes() {
        let runs = fallback_runs();
        let passes = runs.iter().filter(|run| run.is_pass()).count();
        assert_eq!(passes, 6);
    }
}
