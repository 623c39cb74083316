// iperf3 as a measurement tool
// (c) 2024 Ross Younger

use std::{io::ErrorKind, process::Stdio};

use serde::Deserialize;
use tokio::process::Command;
use tracing::trace;

use super::{Direction, MeasurementTool, ProbeError, ProbeParams, ProbeReport, ToolError};

/// Longest snippet of unparseable output we quote back in an error
const SNIPPET_LEN: usize = 220;

/// Drives the `iperf3` command-line tool
#[derive(Debug, Clone)]
pub struct Iperf3 {
    program: String,
}

impl Default for Iperf3 {
    fn default() -> Self {
        Self::new("iperf3")
    }
}

impl Iperf3 {
    /// Creates a driver for the given iperf3 executable (name or path)
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn probe_command(
        &self,
        host: &str,
        port: u16,
        params: &ProbeParams,
        direction: Direction,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        let _ = cmd
            .args(["-c", host])
            .args(["-p", &port.to_string()])
            .args(["-t", &params.duration.as_secs().to_string()])
            .args(["-P", &params.streams.to_string()])
            .args(["-M", &params.segment_size.to_string()])
            .arg("-J");
        if direction == Direction::Reverse {
            let _ = cmd.arg("-R");
        }
        let _ = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl MeasurementTool for Iperf3 {
    async fn check_available(&self) -> Result<(), ToolError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ToolError::Unavailable {
                program: self.program.clone(),
                reason: if e.kind() == ErrorKind::NotFound {
                    "not found in PATH".into()
                } else {
                    e.to_string()
                },
            })?;
        if !output.status.success() {
            return Err(ToolError::Unavailable {
                program: self.program.clone(),
                reason: format!("`--version` failed ({})", output.status),
            });
        }
        trace!(
            "{} --version: {}",
            self.program,
            String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or_default()
        );
        Ok(())
    }

    fn start_listener(&self, port: u16) -> std::io::Result<tokio::process::Child> {
        Command::new(&self.program)
            .args(["-s", "-p", &port.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }

    async fn run_probe(
        &self,
        host: &str,
        port: u16,
        params: &ProbeParams,
        direction: Direction,
    ) -> Result<ProbeReport, ProbeError> {
        let mut cmd = self.probe_command(host, port, params, direction);
        trace!("spawning command: {cmd:?}");
        let output = cmd.output().await.map_err(|e| ProbeError::Spawn {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if !output.status.success() {
            // iperf3 in JSON mode puts its error message in the JSON, when it gets that far
            if let Err(e @ ProbeError::Reported(_)) = parse_report(stdout) {
                return Err(e);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let message = [stderr, stdout]
                .into_iter()
                .find(|s| !s.is_empty())
                .map_or_else(
                    || format!("iperf3 exited with non-zero status ({})", output.status),
                    str::to_string,
                );
            return Err(ProbeError::Exited(message));
        }
        parse_report(stdout)
    }
}

// iperf3 -J output. We only read the end-of-test summary and the error indicator.

#[derive(Debug, Default, Deserialize)]
struct Output {
    #[serde(default)]
    end: Option<End>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct End {
    #[serde(default)]
    sum_sent: Option<Sum>,
    #[serde(default)]
    sum_received: Option<Sum>,
}

#[derive(Debug, Default, Deserialize)]
struct Sum {
    #[serde(default)]
    bits_per_second: Option<f64>,
    #[serde(default)]
    retransmits: Option<u64>,
}

fn snippet(s: &str) -> String {
    match s.char_indices().nth(SNIPPET_LEN) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...", &s[..idx]),
    }
}

/// Does this JSON value indicate an error? (Mirrors a truthiness test: null, false, "" do not.)
fn error_message(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Interprets the output of `iperf3 -J`
pub(super) fn parse_report(json: &str) -> Result<ProbeReport, ProbeError> {
    let output: Output = serde_json::from_str(json)
        .map_err(|_| ProbeError::Parse(format!("failed to parse iperf3 json output: {}", snippet(json))))?;
    if let Some(msg) = output.error.as_ref().and_then(error_message) {
        return Err(ProbeError::Reported(msg));
    }
    let end = output.end.unwrap_or_default();
    let sent = end.sum_sent.unwrap_or_default();
    let received = end.sum_received.unwrap_or_default();
    Ok(ProbeReport {
        sent_bps: sent.bits_per_second.unwrap_or_default(),
        received_bps: received.bits_per_second.unwrap_or_default(),
        retransmits: sent.retransmits.unwrap_or_default(),
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{parse_report, Iperf3};
    use crate::tool::{Direction, MeasurementTool as _, ProbeError, ProbeParams, ToolError};

    const GOOD_OUTPUT: &str = r#"{
        "start": { "connected": [] },
        "intervals": [],
        "end": {
            "sum_sent": { "seconds": 8.0, "bytes": 160000000, "bits_per_second": 160000000.5, "retransmits": 17 },
            "sum_received": { "seconds": 8.0, "bytes": 150000000, "bits_per_second": 150000000.25 }
        }
    }"#;

    #[test]
    fn parses_summary() {
        let r = parse_report(GOOD_OUTPUT).unwrap();
        assert!((r.sent_bps - 160_000_000.5).abs() < 1e-6);
        assert!((r.received_bps - 150_000_000.25).abs() < 1e-6);
        assert_eq!(r.retransmits, 17);
    }

    #[test]
    fn missing_fields_read_as_zero() {
        let r = parse_report(r#"{"end": {"sum_sent": {"bits_per_second": 5.0}}}"#).unwrap();
        assert!((r.sent_bps - 5.).abs() < f64::EPSILON);
        assert!(r.received_bps.abs() < f64::EPSILON);
        assert_eq!(r.retransmits, 0);
        assert!((r.effective_bps() - 5.).abs() < f64::EPSILON);

        let r = parse_report("{}").unwrap();
        assert!(r.effective_bps().abs() < f64::EPSILON);
    }

    #[test]
    fn error_field_is_a_failure() {
        let e = parse_report(
            r#"{"end": {"sum_sent": {"bits_per_second": 5.0}}, "error": "the server is busy running a test. try again later"}"#,
        )
        .unwrap_err();
        assert_eq!(
            e,
            ProbeError::Reported("the server is busy running a test. try again later".into())
        );
    }

    #[test]
    fn empty_error_field_is_not_a_failure() {
        assert!(parse_report(r#"{"error": ""}"#).is_ok());
        assert!(parse_report(r#"{"error": null}"#).is_ok());
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        let e = parse_report("iperf3: error - unable to connect to server").unwrap_err();
        assert!(matches!(e, ProbeError::Parse(_)));
        assert!(e.to_string().contains("unable to connect"));
    }

    #[test]
    fn long_garbage_is_truncated() {
        let junk = "x".repeat(1000);
        let ProbeError::Parse(msg) = parse_report(&junk).unwrap_err() else {
            panic!("wrong error type");
        };
        assert!(msg.ends_with("..."));
        assert!(msg.len() < 300);
    }

    #[test]
    fn probe_command_line() {
        let params = ProbeParams {
            duration: Duration::from_secs(8),
            streams: 4,
            segment_size: 1300,
        };
        let uut = Iperf3::default();
        let cmd = uut.probe_command("10.0.0.1", 443, &params, Direction::Reverse);
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            ["-c", "10.0.0.1", "-p", "443", "-t", "8", "-P", "4", "-M", "1300", "-J", "-R"]
        );
        let cmd = uut.probe_command("10.0.0.1", 443, &params, Direction::Forward);
        assert!(!cmd.as_std().get_args().any(|a| a == "-R"));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let uut = Iperf3::new("portrank-no-such-program-here");
        let e = uut.check_available().await.unwrap_err();
        let ToolError::Unavailable { program, .. } = e;
        assert_eq!(program, "portrank-no-such-program-here");
    }

    #[tokio::test]
    async fn missing_program_fails_probe() {
        let uut = Iperf3::new("portrank-no-such-program-here");
        let params = ProbeParams {
            duration: Duration::from_secs(1),
            streams: 1,
            segment_size: 1300,
        };
        let e = uut
            .run_probe("127.0.0.1", 9, &params, Direction::Forward)
            .await
            .unwrap_err();
        assert!(matches!(e, ProbeError::Spawn { .. }));
    }
}
