//! Human-readable output of client results
// (c) 2024 Ross Younger

use std::fmt::Write as _;

use tabled::{settings::style::Style, Table, Tabled};

use super::{
    measure::MeasurementResult,
    quality::Quality,
    ranking::{PortFailure, RankedReport},
    session::SessionFailure,
};
use crate::cli::styles::{ERROR, HEADING, INFO, SUCCESS, WARNING};

/// How many failed ports the summary lists
pub const MAX_FAILURES_SHOWN: usize = 10;

fn quality_style(quality: Quality) -> anstyle::Style {
    match quality {
        Quality::Excellent => SUCCESS,
        Quality::Good => INFO,
        Quality::Moderate => WARNING,
        Quality::Poor => ERROR,
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Score Mbps")]
    score: String,
    #[tabled(rename = "Down Mbps")]
    down: String,
    #[tabled(rename = "Up Mbps")]
    up: String,
    #[tabled(rename = "Retrans up/down")]
    retransmits: String,
    #[tabled(rename = "Quality")]
    quality: Quality,
}

impl Row {
    fn new(rank: usize, r: &MeasurementResult) -> Self {
        Self {
            rank,
            port: r.port,
            score: format!("{:.2}", r.score_mbps),
            down: format!("{:.2}", r.downlink_mbps),
            up: format!("{:.2}", r.uplink_mbps),
            retransmits: format!("{}/{}", r.retransmits_up, r.retransmits_down),
            quality: r.quality,
        }
    }
}

fn failure_lines(out: &mut String, failures: &[PortFailure]) {
    for f in failures.iter().take(MAX_FAILURES_SHOWN) {
        let _ = writeln!(out, "  port {}: {}", f.port, f.error);
    }
    if failures.len() > MAX_FAILURES_SHOWN {
        let _ = writeln!(out, "  ... and {} more", failures.len() - MAX_FAILURES_SHOWN);
    }
}

/// Renders the summary of a multi-port run: the best `top` ports, the success count and
/// the first few failures
#[must_use]
pub fn format_ranking(report: &RankedReport, top: usize) -> String {
    let mut out = String::new();
    let best = report.top(top);
    let _ = writeln!(out, "{HEADING}Top {} port(s) by score{HEADING:#}", best.len());
    let rows = best
        .iter()
        .enumerate()
        .map(|(i, r)| Row::new(i + 1, r));
    let _ = writeln!(out, "{}", Table::new(rows).with(Style::sharp()));

    if let Some(winner) = best.first() {
        let style = quality_style(winner.quality);
        let _ = writeln!(
            out,
            "Best port {} is {style}{}{style:#}. {}",
            winner.port,
            winner.quality,
            winner.quality.verdict()
        );
    }
    let _ = writeln!(
        out,
        "Successful tests: {}/{}",
        report.successes(),
        report.attempted
    );
    if !report.failures.is_empty() {
        let _ = writeln!(
            out,
            "{WARNING}Failed ports ({}){WARNING:#}:",
            report.failures.len()
        );
        failure_lines(&mut out, &report.failures);
    }
    out
}

/// Renders a session in which every port failed
#[must_use]
pub fn format_total_failure(failure: &SessionFailure) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{ERROR}All {} port test(s) failed{ERROR:#}", failure.failures.len());
    if let Some(first) = failure.failures.first() {
        let _ = writeln!(out, "First error (port {}): {}", first.port, first.error);
    }
    let _ = writeln!(out, "Successful tests: 0/{}", failure.failures.len());
    failure_lines(&mut out, &failure.failures);
    out
}

/// Renders the detailed result of a single-port run
#[must_use]
pub fn format_single(host: &str, result: &MeasurementResult) -> String {
    let style = quality_style(result.quality);
    let mut out = String::new();
    let _ = writeln!(out, "{HEADING}{host} port {}{HEADING:#}", result.port);
    let _ = writeln!(
        out,
        "  Downlink: {:>10.2} Mbps  (retransmits {})",
        result.downlink_mbps, result.retransmits_down
    );
    let _ = writeln!(
        out,
        "  Uplink:   {:>10.2} Mbps  (retransmits {})",
        result.uplink_mbps, result.retransmits_up
    );
    let _ = writeln!(out, "  Score:    {:>10.2} Mbps", result.score_mbps);
    let _ = writeln!(out, "  Quality:  {style}{}{style:#}", result.quality);
    let _ = writeln!(out, "{}", result.quality.verdict());
    out
}

#[cfg(test)]
mod test {
    use assertables::assert_contains;

    use super::{format_ranking, format_single, format_total_failure};
    use crate::client::{
        measure::{MeasureError, MeasurementResult},
        quality::Quality,
        ranking::{PortFailure, RankedReport},
        session::SessionFailure,
    };
    use crate::tool::{Direction, ProbeError};

    fn result(port: u16, score: f64, quality: Quality) -> MeasurementResult {
        MeasurementResult {
            port,
            downlink_mbps: score + 10.,
            uplink_mbps: score,
            score_mbps: score,
            quality,
            retransmits_up: 7,
            retransmits_down: 3,
        }
    }

    fn failure(port: u16) -> PortFailure {
        PortFailure {
            port,
            error: MeasureError {
                direction: Direction::Reverse,
                source: ProbeError::Exited("unable to connect to server".into()),
            },
        }
    }

    #[test]
    fn ranking_summary() {
        let report = RankedReport::new(
            vec![
                result(443, 120., Quality::Moderate),
                result(9999, 250., Quality::Excellent),
            ],
            vec![failure(80)],
            3,
        );
        let out = format_ranking(&report, 5);
        assert_contains!(out, "Top 2 port(s)");
        assert_contains!(out, "250.00");
        assert_contains!(out, "7/3");
        assert_contains!(out, "Best port 9999 is");
        assert_contains!(out, "Successful tests: 2/3");
        assert_contains!(out, "port 80: Downlink test failed: unable to connect to server");
        // best first
        assert!(out.find("9999").unwrap() < out.find("443").unwrap());
    }

    #[test]
    fn ranking_limits_top_and_failures() {
        let results = (1..=8).map(|p| result(p, f64::from(p), Quality::Poor)).collect();
        let failures = (100..112).map(failure).collect();
        let report = RankedReport::new(results, failures, 20);
        let out = format_ranking(&report, 3);
        assert_contains!(out, "Top 3 port(s)");
        assert_contains!(out, "port 109:");
        assert!(!out.contains("port 110:"));
        assert_contains!(out, "... and 2 more");
        assert_contains!(out, "Successful tests: 8/20");
    }

    #[test]
    fn total_failure() {
        let out = format_total_failure(&SessionFailure {
            failures: vec![failure(443), failure(80)],
        });
        assert_contains!(out, "All 2 port test(s) failed");
        assert_contains!(out, "First error (port 443): Downlink test failed");
        assert_contains!(out, "Successful tests: 0/2");
    }

    #[test]
    fn single() {
        let out = format_single("10.0.0.2", &result(9777, 160., Quality::Good));
        assert_contains!(out, "10.0.0.2 port 9777");
        assert_contains!(out, "170.00 Mbps  (retransmits 3)");
        assert_contains!(out, "160.00 Mbps  (retransmits 7)");
        assert_contains!(out, "good");
        assert_contains!(out, Quality::Good.verdict());
    }
}
