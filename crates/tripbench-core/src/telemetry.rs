//! ---
//! tb_section: "01-dashboard-core"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Bounded telemetry sample windows for chart series."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::collections::VecDeque;

use tripbench_model::TelemetrySample;

/// Bounded, time-ordered sample window backing a chart series.
///
/// `push` appends and evicts from the front once the capacity is reached, so
/// the retained points are always a suffix of everything ever pushed. No
/// reordering and no deduplication: duplicate offsets chart as a vertical
/// jump, which is the intended fidelity for fault-current traces.
#[derive(Debug, Clone)]
pub struct TelemetryBuffer {
    points: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl TelemetryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        self.points.push_back(sample);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn extend<I: IntoIterator<Item = TelemetrySample>>(&mut self, samples: I) {
        for sample in samples {
            self.push(sample);
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.points.iter()
    }

    /// Copy out the newest `n` points in time order.
    pub fn tail(&self, n: usize) -> Vec<TelemetrySample> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<TelemetrySample> {
        self.points.iter().cloned().collect()
    }
}
