// Main CLI entrypoint
// (c) 2024 Ross Younger

use std::process::ExitCode;

use super::{
    args::{CliArgs, Mode},
    styles::ERROR,
};

use crate::{
    client::client_main,
    config::{Configuration, Manager},
    server::server_main,
    util::setup_tracing,
};
use anstream::{eprintln, println};
use clap::Parser;
use indicatif::{MultiProgress, ProgressDrawTarget};
use tracing::{debug, error_span, trace_span, Instrument as _};

/// Main CLI entrypoint
pub fn cli() -> anyhow::Result<ExitCode> {
    let args = CliArgs::parse();
    if args.config_files {
        println!("{:?}", Manager::config_files());
        return Ok(ExitCode::SUCCESS);
    }

    let mut manager = Manager::new();
    manager.merge_provider(args.config.clone());
    if args.show_config {
        println!("{}", manager.to_display_adapter::<Configuration>(true));
        return Ok(ExitCode::SUCCESS);
    }
    // Tracing is not yet set up, so configuration errors go straight to the console
    let config = match manager.configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{ERROR}ERROR{ERROR:#}: {e:#}");
            return Ok(ExitCode::FAILURE);
        }
    };

    match args.mode {
        Some(Mode::Server) => run_server(&args, &config),
        Some(Mode::Client) => run_client(&args, &config),
        None => anyhow::bail!("no mode was selected"),
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run_client(args: &CliArgs, config: &Configuration) -> anyhow::Result<ExitCode> {
    let progress = if args.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new() // This writes to stderr
    };
    setup_tracing(args.trace_level(), Some(&progress), args.log_file.as_deref())
        .inspect_err(|e| eprintln!("{e:?}"))?;
    debug!("client mode; {}", config.format_measurement_config());

    client_main(args, config, &progress)
        .instrument(trace_span!("CLIENT"))
        .await
        .inspect_err(|e| tracing::error!("{e:#}"))
        .or_else(|_| Ok(false))
        .map(exit_code)
}

#[tokio::main(flavor = "current_thread")]
async fn run_server(args: &CliArgs, config: &Configuration) -> anyhow::Result<ExitCode> {
    setup_tracing(args.trace_level(), None, args.log_file.as_deref())
        .inspect_err(|e| eprintln!("{e:?}"))?;
    debug!("server mode; {}", config.format_measurement_config());

    server_main(config, args.multi)
        .instrument(error_span!("SERVER"))
        .await
        .inspect_err(|e| tracing::error!("{e:#}"))
        .or_else(|_| Ok(false))
        .map(exit_code)
}
