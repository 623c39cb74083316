//! Ranking of measured ports
// (c) 2024 Ross Younger

use std::cmp::Ordering;

use super::measure::{MeasureError, MeasurementResult};

/// Sorts results best first: by score, then downlink, then uplink.
///
/// The sort is stable; results which tie on all three keys keep their relative order.
#[must_use]
pub fn rank(mut results: Vec<MeasurementResult>) -> Vec<MeasurementResult> {
    results.sort_by(compare_descending);
    results
}

fn compare_descending(a: &MeasurementResult, b: &MeasurementResult) -> Ordering {
    b.score_mbps
        .total_cmp(&a.score_mbps)
        .then_with(|| b.downlink_mbps.total_cmp(&a.downlink_mbps))
        .then_with(|| b.uplink_mbps.total_cmp(&a.uplink_mbps))
}

/// A port which could not be measured
#[derive(Debug, Clone, PartialEq)]
pub struct PortFailure {
    /// The port
    pub port: u16,
    /// What went wrong
    pub error: MeasureError,
}

/// The outcome of a benchmark session with at least one success
#[derive(Debug, Clone, PartialEq)]
pub struct RankedReport {
    /// Successful measurements, best first
    pub ranked: Vec<MeasurementResult>,
    /// Ports which failed, in the order they were tried
    pub failures: Vec<PortFailure>,
    /// Number of ports tried
    pub attempted: usize,
}

impl RankedReport {
    /// Ranks a set of results into a report
    #[must_use]
    pub fn new(results: Vec<MeasurementResult>, failures: Vec<PortFailure>, attempted: usize) -> Self {
        Self {
            ranked: rank(results),
            failures,
            attempted,
        }
    }

    /// Number of successful measurements
    #[must_use]
    pub fn successes(&self) -> usize {
        self.ranked.len()
    }

    /// The best `k` results (or all of them, if there are fewer)
    #[must_use]
    pub fn top(&self, k: usize) -> &[MeasurementResult] {
        &self.ranked[..k.min(self.ranked.len())]
    }
}
