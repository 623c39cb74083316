// portrank top-level command-line arguments
// (c) 2024 Ross Younger

use crate::{config::Configuration_Optional, util::PortList};
use clap::{Parser, ValueEnum};

/// Options that switch us into another mode i.e. which don't require a `--mode`
pub(crate) const MODE_OPTIONS: &[&str] = &["show_config", "config_files"];

/// Which side of the measurement we are
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Mode {
    /// Runs listeners for a client to measure against
    Server,
    /// Measures throughput to a server
    Client,
}

#[derive(Debug, Parser, Clone)]
#[command(
    author,
    version(env!("PORTRANK_VERSION_STRING")),
    about,
    before_help = "e.g.   portrank --mode server --multi\n       portrank --mode client --multi --host my-server --ports 443,80,9999",
    infer_long_args(true)
)]
#[command(help_template(
    "\
{name} version {version}
{about-with-newline}
{usage-heading} {usage}
{before-help}
{all-args}{after-help}
"
))]
#[command(styles=super::styles::CLAP_STYLES)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CliArgs {
    // MODE SELECTION ======================================================================
    /// Selects server or client mode
    #[arg(
        short,
        long,
        value_enum,
        required_unless_present_any(MODE_OPTIONS),
        help_heading("Modes")
    )]
    pub mode: Option<Mode>,

    /// Works with many ports at once.
    ///
    /// A server starts a pool of listeners; a client measures a list of ports and ranks them.
    #[arg(long, action, help_heading("Modes"))]
    pub multi: bool,

    /// Outputs the configuration, then exits
    ///
    /// This shows each option, its value, and where the value came from.
    #[arg(long, conflicts_with_all(["mode", "config_files"]), help_heading("Configuration"))]
    pub show_config: bool,

    /// Outputs the paths to configuration file(s), then exits
    #[arg(long, conflicts_with("mode"), help_heading("Configuration"))]
    pub config_files: bool,

    // CLIENT OPTIONS ======================================================================
    /// The server to measure against (client mode)
    #[arg(short = 'H', long, required_if_eq("mode", "client"), help_heading("Client"))]
    pub host: Option<String>,

    /// The ports to measure in multi-port client mode, comma separated
    /// [default: the required ports]
    ///
    /// Typically this is the list printed by a multi-port server.
    #[arg(long, value_name("a,b,c"), requires("multi"), help_heading("Client"))]
    pub ports: Option<PortList>,

    // OUTPUT ==============================================================================
    /// Quiet mode
    ///
    /// Switches off progress display; reports only errors and results
    #[arg(short, long, action, conflicts_with("debug"), help_heading("Output"))]
    pub quiet: bool,

    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=portrank=trace` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"))]
    pub debug: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(short('l'), long, action, help_heading("Debug"), value_name("FILE"))]
    pub log_file: Option<String>,

    // CONFIGURABLE OPTIONS ================================================================
    #[command(flatten)]
    pub config: Configuration_Optional,
}

impl CliArgs {
    pub(crate) fn trace_level(&self) -> &'static str {
        if self.debug {
            "trace"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod test {
    use clap::{error::ErrorKind, Parser as _};

    use super::{CliArgs, Mode};

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("portrank").chain(args.iter().copied()))
    }

    #[test]
    fn server_modes() {
        let a = parse(&["--mode", "server"]).unwrap();
        assert_eq!(a.mode, Some(Mode::Server));
        assert!(!a.multi);
        let a = parse(&["-m", "server", "--multi", "-n", "20"]).unwrap();
        assert!(a.multi);
        assert_eq!(a.config.target_count, Some(20));
    }

    #[test]
    fn client_requires_host() {
        let e = parse(&["--mode", "client"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MissingRequiredArgument);
        let a = parse(&["--mode", "client", "--host", "10.0.0.2", "-t", "5", "-P", "4"]).unwrap();
        assert_eq!(a.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(a.config.duration, Some(5));
        assert_eq!(a.config.streams, Some(4));
    }

    #[test]
    fn mode_is_required() {
        let e = parse(&[]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::MissingRequiredArgument);
        let a = parse(&["--show-config"]).unwrap();
        assert!(a.show_config && a.mode.is_none());
        let _ = parse(&["--config-files"]).unwrap();
    }

    #[test]
    fn port_list() {
        let a = parse(&[
            "--mode", "client", "--multi", "--host", "h", "--ports", "443, 80,bad,443",
        ])
        .unwrap();
        let ports = a.ports.unwrap();
        assert_eq!(ports.ports(), [443, 80]);
        assert_eq!(ports.invalid(), ["bad"]);

        let e = parse(&["--mode", "client", "--multi", "--host", "h", "--ports", "x,y"]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ValueValidation);

        // --ports only makes sense with --multi
        let _ = parse(&["--mode", "client", "--host", "h", "--ports", "443"]).unwrap_err();
    }

    #[test]
    fn required_ports_are_comma_separated() {
        let a = parse(&["--mode", "server", "--multi", "--required-ports", "8443,443"]).unwrap();
        assert_eq!(a.config.required_ports, Some(vec![8443, 443]));
    }

    #[test]
    fn trace_levels() {
        assert_eq!(parse(&["-m", "server"]).unwrap().trace_level(), "info");
        assert_eq!(parse(&["-m", "server", "-d"]).unwrap().trace_level(), "trace");
        assert_eq!(parse(&["-m", "server", "-q"]).unwrap().trace_level(), "error");
        let _ = parse(&["-m", "server", "-q", "-d"]).unwrap_err();
    }
}
