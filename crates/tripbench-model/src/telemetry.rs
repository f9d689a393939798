//! ---
//! tb_section: "02-data-model-gateway"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Domain types shared across the dashboard runtime."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One time-series point captured during a trip test. Offsets are measured
/// from fault onset; duplicate offsets are legal and chart as a vertical jump.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySample {
    #[serde(default)]
    pub test_id: Option<String>,
    pub time_offset_ms: u64,
    pub voltage: f64,
    pub current: f64,
    pub created_at: DateTime<Utc>,
}

impl TelemetrySample {
    pub fn new(test_id: Option<String>, time_offset_ms: u64, voltage: f64, current: f64) -> Self {
        Self {
            test_id,
            time_offset_ms,
            voltage,
            current,
            created_at: Utc::now(),
        }
    }
}
