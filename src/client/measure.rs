//! One bidirectional measurement of a single port
// (c) 2024 Ross Younger

use tracing::{debug, trace_span, Instrument as _};

use super::quality::{Quality, QualityThresholds};
use crate::tool::{Direction, MeasurementTool, ProbeError, ProbeParams, ProbeReport};

/// Converts bits per second to megabits per second
#[must_use]
pub fn to_mbps(bps: f64) -> f64 {
    bps / 1_000_000.
}

/// The outcome of a successful bidirectional measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementResult {
    /// Port measured
    pub port: u16,
    /// Remote to local throughput, Mbps
    pub downlink_mbps: f64,
    /// Local to remote throughput, Mbps
    pub uplink_mbps: f64,
    /// The lesser of uplink and downlink, Mbps
    pub score_mbps: f64,
    /// Quality tier of the floor throughput
    pub quality: Quality,
    /// Retransmits reported by the uplink probe
    pub retransmits_up: u64,
    /// Retransmits reported by the downlink probe
    pub retransmits_down: u64,
}

impl MeasurementResult {
    /// Combines the two probes of a measurement
    #[must_use]
    pub fn from_probes(
        port: u16,
        down: &ProbeReport,
        up: &ProbeReport,
        thresholds: &QualityThresholds,
    ) -> Self {
        let downlink_mbps = to_mbps(down.effective_bps());
        let uplink_mbps = to_mbps(up.effective_bps());
        Self {
            port,
            downlink_mbps,
            uplink_mbps,
            score_mbps: uplink_mbps.min(downlink_mbps),
            quality: thresholds.classify(uplink_mbps, downlink_mbps),
            retransmits_up: up.retransmits,
            retransmits_down: down.retransmits,
        }
    }
}

/// A measurement failed. One direction failing fails the whole measurement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{direction} test failed: {source}")]
pub struct MeasureError {
    /// The direction which failed
    pub direction: Direction,
    /// Why it failed
    pub source: ProbeError,
}

/// Measures one port in both directions.
///
/// The downlink (reverse) probe runs first, then the uplink (forward) probe.
/// If the downlink probe fails, the uplink probe is not attempted.
pub async fn measure<T: MeasurementTool>(
    tool: &T,
    host: &str,
    port: u16,
    params: &ProbeParams,
    thresholds: &QualityThresholds,
) -> Result<MeasurementResult, MeasureError> {
    let probe = |direction| async move {
        tool.run_probe(host, port, params, direction)
            .instrument(trace_span!("probe", %direction))
            .await
            .map_err(|source| MeasureError { direction, source })
    };

    let down = probe(Direction::Reverse).await?;
    debug!("port {port} downlink: {down:?}");
    let up = probe(Direction::Forward).await?;
    debug!("port {port} uplink: {up:?}");
    Ok(MeasurementResult::from_probes(port, &down, &up, thresholds))
}
