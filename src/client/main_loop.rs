// portrank client event loop
// (c) 2024 Ross Younger

use anstream::println;
use anyhow::Context as _;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::time::Duration;
use tracing::{error, info, warn};

use super::{
    measure::measure,
    quality::QualityThresholds,
    report,
    session::{self, BenchmarkSession},
};
use crate::{
    cli::CliArgs,
    config::Configuration,
    tool::{Iperf3, MeasurementTool},
};

const PROGRESS_TEMPLATE: &str = "{spinner} [{bar:30}] {pos}/{len} {msg} ({elapsed})";

/// Client main loop.
///
/// Returns `Ok(true)` if at least one port was measured successfully.
// Caution: As we are using ProgressBar, anything to be printed to console should use progress.println() !
pub(crate) async fn client_main(
    args: &CliArgs,
    config: &Configuration,
    display: &MultiProgress,
) -> anyhow::Result<bool> {
    let host = args
        .host
        .as_deref()
        .context("a target host is required in client mode")?;
    let tool = Iperf3::new(&config.tool);
    tool.check_available().await?;

    if args.multi {
        let ports = match &args.ports {
            Some(list) => {
                if !list.invalid().is_empty() {
                    warn!("Ignoring invalid port(s): {}", list.invalid().join(","));
                }
                list.ports().to_vec()
            }
            None => config.required_ports.clone(),
        };
        multi_port(&tool, host, &ports, config, display).await
    } else {
        single_port(&tool, host, config, display).await
    }
}

pub(crate) async fn multi_port<T: MeasurementTool>(
    tool: &T,
    host: &str,
    ports: &[u16],
    config: &Configuration,
    display: &MultiProgress,
) -> anyhow::Result<bool> {
    let session = BenchmarkSession::new(host, ports, config.probe_params());
    anyhow::ensure!(!session.ports().is_empty(), "there are no ports to test");
    info!("{session}");

    let progress = display.add(ProgressBar::new(
        u64::try_from(session.ports().len()).unwrap_or_default(),
    ));
    progress.set_style(
        ProgressStyle::with_template(PROGRESS_TEMPLATE)?.progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(250));

    let outcome = session::run(tool, &session, &config.thresholds(), &progress).await;
    progress.finish_and_clear();

    match outcome {
        Ok(ranked) => {
            println!(
                "{}",
                report::format_ranking(&ranked, usize::from(config.top_count))
            );
            Ok(true)
        }
        Err(failure) => {
            println!("{}", report::format_total_failure(&failure));
            Ok(false)
        }
    }
}

pub(crate) async fn single_port<T: MeasurementTool>(
    tool: &T,
    host: &str,
    config: &Configuration,
    display: &MultiProgress,
) -> anyhow::Result<bool> {
    let port = config.port;
    info!("Testing {host}:{port} ({})", config.format_measurement_config());

    let spinner = display.add(ProgressBar::new_spinner());
    spinner.enable_steady_tick(Duration::from_millis(150));
    spinner.set_message(format!("Measuring {host}:{port}"));
    let thresholds: QualityThresholds = config.thresholds();
    let outcome = measure(tool, host, port, &config.probe_params(), &thresholds).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(result) => {
            println!("{}", report::format_single(host, &result));
            Ok(true)
        }
        Err(e) => {
            error!("{e}");
            warn!(
                "Ensure remote {tool} server is running: `{tool} -s -p {port}`",
                tool = config.tool
            );
            Ok(false)
        }
    }
}
