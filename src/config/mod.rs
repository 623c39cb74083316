// (c) 2024 Ross Younger
//! # Configuration management
//!
//! portrank obtains run-time configuration from the following sources, in order:
//! 1. Command-line options
//! 2. The user's configuration file (typically `~/.portrank.toml`)
//! 3. The system-wide configuration file (typically `/etc/portrank.toml`)
//! 4. Hard-wired defaults
//!
//! Each option may appear in multiple places, but only the first match is used.
//!
//! **Note** Configuration file locations are platform-dependent.
//! To see what applies on the current platform, run `portrank --config-files`.
//!
//! ## File format
//!
//! Configuration files are [TOML](https://toml.io/). Field names are the long
//! command-line option names, with underscores in place of hyphens.
//!
//! ### Example
//!
//! ```text
//! # Our link is long and thin; take longer over each probe
//! duration = 15
//! streams = 4
//!
//! # Our tunnels prefer these
//! required_ports = [8443, 443, 2053]
//! target_count = 50
//!
//! # A 100Mbit line is as good as it gets here
//! excellent_mbps = 90
//! good_mbps = 60
//! poor_mbps = 30
//! ```
//!
//! ## Configurable options
//!
//! The full list of supported fields is defined by [Configuration].
//!
//! On the command line:
//! * `portrank --show-config` outputs a list of supported fields, their current values, and where each value came from.
//! * For an explanation of each field, refer to `portrank --help` .
//! * `portrank --config-files` outputs the list of configuration files for the current user and platform.
//!
//! ### Traps and tips
//! 1. The quality thresholds are checked together: they must satisfy `poor_mbps <= good_mbps <= excellent_mbps`.
//! 1. `required_ports` replaces the built-in list; it is not merged with it.

mod structure;
pub use structure::{Configuration, DEFAULT_REQUIRED_PORTS};
pub(crate) use structure::Configuration_Optional;

mod manager;
pub use manager::{DisplayAdapter, Manager};

pub(crate) const BASE_CONFIG_FILENAME: &str = "portrank.toml";
