//! portrank server main loop
// (c) 2024 Ross Younger

use anstream::println;
use tracing::{error, info, warn};

use super::pool::{ServerPool, StartReport};
use crate::{
    config::Configuration,
    os::{AbstractPlatform as _, Platform},
    planner::{PortCandidate, PortPlanner},
    tool::{Iperf3, MeasurementTool},
    util::csv,
};

/// Server main loop.
///
/// Starts one listener (or, with `multi`, a pool of them), prints the ports to stdout,
/// then serves until interrupted. Every listener is stopped before this returns,
/// whichever way it returns.
///
/// Returns `Ok(false)` if no listener could be started.
#[allow(clippy::module_name_repetitions)]
pub async fn server_main(config: &Configuration, multi: bool) -> anyhow::Result<bool> {
    let tool = Iperf3::new(&config.tool);
    tool.check_available().await?;
    let mut pool = ServerPool::new(config.settle(), config.stop_timeout());

    let outcome = serve(&tool, config, multi, &mut pool).await;

    if !pool.is_empty() {
        info!("Stopping {} listener(s)", pool.len());
    }
    pool.stop().await;
    outcome
}

/// Runs the pool until interrupted. The caller stops the pool.
pub(crate) async fn serve<T: MeasurementTool>(
    tool: &T,
    config: &Configuration,
    multi: bool,
    pool: &mut ServerPool,
) -> anyhow::Result<bool> {
    let shutdown = Platform::shutdown_signal();
    tokio::pin!(shutdown);

    let report = tokio::select! {
        report = start_listeners(tool, config, multi, pool) => report,
        r = &mut shutdown => {
            r?;
            info!("Interrupted during startup");
            return Ok(true);
        }
    };

    if !report.failed_required.is_empty() {
        warn!(
            "Required port(s) could not be served: {}",
            csv(&report.failed_required)
        );
    }
    if report.started.is_empty() {
        error!(
            "No listener could be started ({} attempt(s) failed)",
            report.failed
        );
        return Ok(false);
    }
    info!(
        "{} listener(s) running, {} attempt(s) failed",
        report.started.len(),
        report.failed
    );

    let ports = csv(&report.started);
    println!("{ports}");
    if multi {
        info!("On the client, run: portrank --mode client --multi --host <this host> --ports {ports}");
    }
    info!("Press Ctrl-C to stop");

    shutdown.await?;
    info!("Shutting down");
    Ok(true)
}

async fn start_listeners<T: MeasurementTool>(
    tool: &T,
    config: &Configuration,
    multi: bool,
    pool: &mut ServerPool,
) -> StartReport {
    if multi {
        let target = usize::from(config.target_count);
        let mut planner = PortPlanner::from_entropy(config.max_attempts);
        let candidates = planner.plan(&config.required_ports, target);
        info!(
            "Starting up to {target} listeners ({} required)",
            config.required_ports.len()
        );
        pool.start(tool, &candidates, target, Some(&mut planner))
            .await
    } else {
        info!("Starting listener on port {}", config.port);
        let candidate = PortCandidate {
            port: config.port,
            required: true,
        };
        pool.start(tool, &[candidate], 1, None::<&mut PortPlanner>)
            .await
    }
}
