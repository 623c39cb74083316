//! OS abstraction layer
// (c) 2024 Ross Younger

use std::path::PathBuf;

use anyhow::Result;
use tokio::process::Child;

/// General platform abstraction trait.
/// The active implementation should be pulled into this crate
/// Implementations should be called `Platform`, e.g. [Platform].
pub trait AbstractPlatform {
    /// Asks a child process to exit gracefully.
    ///
    /// This does not wait for it to exit. A process which has already exited is not an error.
    fn request_termination(child: &Child) -> Result<()>;

    /// Completes when the user (or the system) asks us to shut down.
    ///
    /// On Unix this is SIGINT (Ctrl-C) or SIGTERM.
    fn shutdown_signal() -> impl std::future::Future<Output = Result<()>>;

    /// The absolute path to the user configuration file, if one is defined on this platform.
    ///
    /// If somehow we could not determine the path to use, returns None.
    fn user_config_path() -> Option<PathBuf>;

    /// The absolute path to the system configuration file, if one is defined on this platform.
    fn system_config_path() -> Option<PathBuf>;
}

#[cfg(any(unix, doc))]
mod unix;

#[cfg(any(unix, doc))]
pub use unix::*;

static_assertions::assert_cfg!(unix, "This OS is not yet supported");
