//! The external measurement tool
// (c) 2024 Ross Younger
//!
//! portrank never speaks TCP itself. Everything it knows about throughput comes from
//! an external tool which can run a listener on a port, and run a directional probe
//! against a remote listener. [`MeasurementTool`] is that contract; [`Iperf3`] is the
//! implementation used in production.

use std::time::Duration;

use strum::Display;

mod iperf3;
pub use iperf3::Iperf3;

/// The direction of a single probe, seen from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Direction {
    /// Remote to local (the tool's reverse mode)
    #[strum(to_string = "Downlink")]
    Reverse,
    /// Local to remote
    #[strum(to_string = "Uplink")]
    Forward,
}

/// Parameters shared by both probes of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeParams {
    /// How long each probe runs
    pub duration: Duration,
    /// Number of parallel streams
    pub streams: u16,
    /// TCP maximum segment size requested of the tool
    pub segment_size: u16,
}

/// The structured result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeReport {
    /// Sender-side throughput
    pub sent_bps: f64,
    /// Receiver-side throughput; zero if the tool could not determine it
    pub received_bps: f64,
    /// Retransmitted segments reported by the sender
    pub retransmits: u64,
}

impl ProbeReport {
    /// The throughput to believe for this probe, in bits per second.
    ///
    /// This is the receiver-side figure when there is one, otherwise the sender-side figure.
    #[must_use]
    pub fn effective_bps(&self) -> f64 {
        if self.received_bps > 0. {
            self.received_bps
        } else {
            self.sent_bps
        }
    }
}

/// Why a single probe failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The tool could not be launched at all
    #[error("failed to run {program}: {reason}")]
    Spawn {
        /// Program we tried to run
        program: String,
        /// What the OS told us
        reason: String,
    },
    /// The tool exited unsuccessfully
    #[error("{0}")]
    Exited(String),
    /// The tool's output could not be understood
    #[error("failed to parse tool output: {0}")]
    Parse(String),
    /// The tool completed but reported an error in its output
    #[error("{0}")]
    Reported(String),
}

/// Errors preventing any use of the tool
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The tool is not installed, or cannot be run
    #[error("{program} is not available ({reason}); please install it")]
    Unavailable {
        /// Program we looked for
        program: String,
        /// Why we think it is unavailable
        reason: String,
    },
}

/// An external capability which measures directional throughput
#[allow(async_fn_in_trait)]
pub trait MeasurementTool {
    /// Checks that the tool can be invoked at all
    async fn check_available(&self) -> Result<(), ToolError>;

    /// Launches a listener on the given port.
    ///
    /// The returned process serves until it is terminated.
    /// It should be created with `kill_on_drop`.
    fn start_listener(&self, port: u16) -> std::io::Result<tokio::process::Child>;

    /// Runs a single directional probe against a listener at `host:port`
    async fn run_probe(
        &self,
        host: &str,
        port: u16,
        params: &ProbeParams,
        direction: Direction,
    ) -> Result<ProbeReport, ProbeError>;
}
