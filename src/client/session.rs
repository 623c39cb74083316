//! Multi-port benchmark sessions
// (c) 2024 Ross Younger

use std::collections::HashSet;

use human_repr::HumanDuration as _;
use indicatif::ProgressBar;
use tracing::{error, info, info_span, Instrument as _};

use super::measure::measure;
use super::quality::QualityThresholds;
use super::ranking::{PortFailure, RankedReport};
use crate::tool::{MeasurementTool, ProbeParams};

/// The fixed parameters of a benchmark run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkSession {
    host: String,
    ports: Vec<u16>,
    params: ProbeParams,
}

impl BenchmarkSession {
    /// Creates a session. Repeated ports are dropped; the first occurrence wins.
    #[must_use]
    pub fn new(host: &str, ports: &[u16], params: ProbeParams) -> Self {
        let mut seen = HashSet::new();
        let ports = ports.iter().copied().filter(|p| seen.insert(*p)).collect();
        Self {
            host: host.to_string(),
            ports,
            params,
        }
    }

    /// Target host
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Ports to measure, in order
    #[must_use]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Probe parameters
    #[must_use]
    pub fn params(&self) -> &ProbeParams {
        &self.params
    }
}

impl std::fmt::Display for BenchmarkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Target={} | Ports={} | Duration={} | Streams={} | MSS={}",
            self.host,
            self.ports.len(),
            self.params.duration.human_duration(),
            self.params.streams,
            self.params.segment_size
        )
    }
}

/// Every port in a session failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("all {} port tests failed", .failures.len())]
pub struct SessionFailure {
    /// The failures, in the order they occurred
    pub failures: Vec<PortFailure>,
}

/// Measures every port of the session, one at a time, and ranks the successes.
///
/// Ports are measured strictly in sequence: concurrent probes over the same path
/// would interfere with each other. A failing port is recorded and skipped.
pub async fn run<T: MeasurementTool>(
    tool: &T,
    session: &BenchmarkSession,
    thresholds: &QualityThresholds,
    progress: &ProgressBar,
) -> Result<RankedReport, SessionFailure> {
    let total = session.ports.len();
    let mut results = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (index, &port) in session.ports.iter().enumerate() {
        let index = index + 1;
        progress.set_message(format!("{}:{port}", session.host));
        info!("[{index}/{total}] Testing {}:{port} ...", session.host);
        let outcome = measure(tool, &session.host, port, &session.params, thresholds)
            .instrument(info_span!("port", port))
            .await;
        match outcome {
            Ok(result) => {
                info!(
                    "[{index}/{total}] port={port} score={:.2} Mbps down={:.2} Mbps up={:.2} Mbps retrans(up/down)={}/{} quality={}",
                    result.score_mbps,
                    result.downlink_mbps,
                    result.uplink_mbps,
                    result.retransmits_up,
                    result.retransmits_down,
                    result.quality
                );
                results.push(result);
            }
            Err(error) => {
                error!("[{index}/{total}] port={port} failed: {error}");
                failures.push(PortFailure { port, error });
            }
        }
        progress.inc(1);
    }

    if results.is_empty() {
        return Err(SessionFailure { failures });
    }
    Ok(RankedReport::new(results, failures, total))
}
