//! Configuration structure
// (c) 2024 Ross Younger

use std::time::Duration;

use anyhow::ensure;
use clap::Parser;
use human_repr::HumanDuration as _;
use serde::{Deserialize, Serialize};
use struct_field_names_as_array::FieldNamesAsSlice;

use crate::{
    client::quality::QualityThresholds, planner::DEFAULT_MAX_ATTEMPTS, tool::ProbeParams,
    util::derive_deftly_template_Optionalify,
};

use derive_deftly::Deftly;

/// Ports which are always tried first, in this order
pub const DEFAULT_REQUIRED_PORTS: [u16; 6] = [443, 80, 9999, 2053, 2095, 2086];

/// The set of configurable options supported by portrank.
///
/// **Note:** The implementation of `default()` for this struct returns portrank's hard-wired configuration defaults.
///
/// This structure uses the [Optionalify](derive_deftly_template_Optionalify) deftly macro to automatically
/// define the `Configuration_Optional` struct, which is the same but has all members of type `Option<whatever>`.
/// This is the magic that lets us use the same underlying struct for CLI and saved configuration files:
/// the CLI uses the `_Optional` version , with everything defaulting to `None`.
/// The result is that wherever the user does not provide a value, values read from lower priority sources
/// (configuration files and system defaults) obtain.
///
// Maintainer note: None of the members of this struct should be Option<anything>. That leads to sunspots in the CLI and strange warts (Some(Some(foo))).
#[derive(Deftly)]
#[derive_deftly(Optionalify)]
#[deftly(visibility = "pub(crate)")]
#[derive(Debug, Clone, PartialEq, Eq, Parser, Deserialize, Serialize, FieldNamesAsSlice)]
pub struct Configuration {
    // MEASUREMENT PARAMETERS ==========================================================================
    /// The port to serve or measure in single-port mode [default: 9777]
    #[arg(short = 'p', long, value_name("port"), help_heading("Measurement"))]
    pub port: u16,

    /// How long each directional probe runs, in seconds [default: 8]
    #[arg(short = 't', long, value_name("sec"), help_heading("Measurement"))]
    pub duration: u32,

    /// Number of parallel streams per probe [default: 8]
    #[arg(short = 'P', long, value_name("n"), help_heading("Measurement"))]
    pub streams: u16,

    /// TCP maximum segment size passed to both probes, in bytes [default: 1300]
    #[arg(short = 'M', long, value_name("bytes"), help_heading("Measurement"))]
    pub segment_size: u16,

    /// The measurement tool to run [default: iperf3]
    #[arg(long, value_name("program"), help_heading("Measurement"))]
    pub tool: String,

    // PORT POOL =======================================================================================
    /// How many listeners the multi-port server tries to start [default: 100]
    #[arg(short = 'n', long, value_name("n"), help_heading("Port pool"))]
    pub target_count: u16,

    /// Ports which are always tried first, in order [default: 443,80,9999,2053,2095,2086]
    ///
    /// The multi-port client measures these when no `--ports` are given.
    ///
    /// **In a configuration file** this field is an array of integers.
    #[arg(
        long,
        value_name("a,b,c"),
        value_delimiter(','),
        help_heading("Port pool")
    )]
    pub required_ports: Vec<u16>,

    /// Cap on random draws when looking for further ports [default: 10000]
    #[arg(long, value_name("n"), help_heading("Port pool"))]
    pub max_attempts: u32,

    /// How long a listener must stay up before we believe it bound its port, in milliseconds [default: 80]
    #[arg(long, value_name("ms"), help_heading("Port pool"))]
    pub settle_ms: u32,

    /// How long each listener may take to exit before it is killed, in milliseconds [default: 2000]
    #[arg(long, value_name("ms"), help_heading("Port pool"))]
    pub stop_timeout_ms: u32,

    // REPORTING =======================================================================================
    /// How many of the best ports the client summary shows [default: 5]
    #[arg(short = 'k', long, value_name("n"), help_heading("Reporting"))]
    pub top_count: u16,

    /// Minimum throughput in both directions for an "excellent" rating, in Mbps [default: 200]
    #[arg(long, value_name("Mbps"), help_heading("Reporting"))]
    pub excellent_mbps: u32,

    /// Minimum throughput in both directions for a "good" rating, in Mbps [default: 150]
    #[arg(long, value_name("Mbps"), help_heading("Reporting"))]
    pub good_mbps: u32,

    /// Below this throughput in either direction, the rating is "poor", in Mbps [default: 100]
    #[arg(long, value_name("Mbps"), help_heading("Reporting"))]
    pub poor_mbps: u32,
}

impl Configuration {
    /// Checks the values make sense together
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.streams > 0, "streams must be at least 1");
        ensure!(self.duration > 0, "duration must be at least 1 second");
        ensure!(self.target_count > 0, "target_count must be at least 1");
        ensure!(
            self.poor_mbps <= self.good_mbps && self.good_mbps <= self.excellent_mbps,
            "quality thresholds must satisfy poor ({}) <= good ({}) <= excellent ({})",
            self.poor_mbps,
            self.good_mbps,
            self.excellent_mbps
        );
        Ok(())
    }

    /// Probe duration accessor
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration.into())
    }

    /// Listener settle delay accessor
    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms.into())
    }

    /// Listener stop timeout accessor
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms.into())
    }

    /// The parameters shared by every probe
    #[must_use]
    pub fn probe_params(&self) -> ProbeParams {
        ProbeParams {
            duration: self.duration(),
            streams: self.streams,
            segment_size: self.segment_size,
        }
    }

    /// The configured quality tier boundaries
    #[must_use]
    pub fn thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            excellent: self.excellent_mbps.into(),
            good: self.good_mbps.into(),
            poor: self.poor_mbps.into(),
        }
    }

    /// Formats the measurement options for display
    #[must_use]
    pub fn format_measurement_config(&self) -> String {
        format!(
            "{tool}, {duration} per direction, {streams} streams, MSS {mss}",
            tool = self.tool,
            duration = self.duration().human_duration(),
            streams = self.streams,
            mss = self.segment_size,
        )
    }
}

impl Default for Configuration {
    /// **(Unusual!)**
    /// Returns portrank's hard-wired configuration defaults.
    fn default() -> Self {
        Self {
            // Measurement
            port: 9777,
            duration: 8,
            streams: 8,
            segment_size: 1300,
            tool: "iperf3".into(),

            // Pool
            target_count: 100,
            required_ports: DEFAULT_REQUIRED_PORTS.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            settle_ms: 80,
            stop_timeout_ms: 2000,

            // Reporting
            top_count: 5,
            excellent_mbps: 200,
            good_mbps: 150,
            poor_mbps: 100,
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::Configuration;
    use crate::{
        client::quality::QualityThresholds,
        server::{DEFAULT_SETTLE, DEFAULT_STOP_TIMEOUT},
    };

    #[test]
    fn flattened() {
        let v = Configuration::default();
        let j = serde_json::to_value(&v).unwrap();
        assert!(j.get("streams").is_some());
        assert!(j.get("required_ports").unwrap().is_array());
        assert!(j.get("thresholds").is_none());
    }

    #[test]
    fn defaults_agree_with_components() {
        let c = Configuration::default();
        assert_eq!(c.thresholds(), QualityThresholds::default());
        assert_eq!(c.settle(), DEFAULT_SETTLE);
        assert_eq!(c.stop_timeout(), DEFAULT_STOP_TIMEOUT);
        let p = c.probe_params();
        assert_eq!(p.duration, Duration::from_secs(8));
        assert_eq!(p.streams, 8);
        assert_eq!(p.segment_size, 1300);
        c.validate().unwrap();
    }

    #[test]
    fn zero_streams_rejected() {
        let c = Configuration {
            streams: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_duration_rejected() {
        let c = Configuration {
            duration: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_target_count_rejected() {
        let c = Configuration {
            target_count: 0,
            ..Default::default()
        };
        let e = c.validate().unwrap_err();
        assert_eq!(e.to_string(), "target_count must be at least 1");
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let c = Configuration {
            good_mbps: 250,
            ..Default::default()
        };
        let e = c.validate().unwrap_err();
        assert!(e.to_string().contains("good (250)"));

        let c = Configuration {
            poor_mbps: 150,
            good_mbps: 150,
            excellent_mbps: 150,
            ..Default::default()
        };
        c.validate().unwrap();
    }

    #[test]
    fn measurement_summary() {
        let s = Configuration::default().format_measurement_config();
        assert!(s.starts_with("iperf3, "));
        assert!(s.ends_with("8 streams, MSS 1300"));
    }
}
