// OS abstraction layer for portrank - Unix implementation
// (c) 2024 Ross Younger

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use nix::{
    errno::Errno,
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use tokio::{
    process::Child,
    signal::unix::{signal, SignalKind},
};
use tracing::trace;

use super::AbstractPlatform;
use crate::config::BASE_CONFIG_FILENAME;

#[derive(Debug, Clone, Copy)]
/// OS abstraction layer for Unix-like platforms
pub struct Platform {}

impl AbstractPlatform for Platform {
    fn request_termination(child: &Child) -> Result<()> {
        // id() is None once the child has been reaped
        let Some(pid) = child.id() else {
            return Ok(());
        };
        let pid = Pid::from_raw(i32::try_from(pid)?);
        match kill(pid, Signal::SIGTERM) {
            // ESRCH: it already exited but has not been reaped yet
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("sending SIGTERM to process {pid}")),
        }
    }

    async fn shutdown_signal() -> Result<()> {
        let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("installing SIGINT handler")?;
                trace!("got SIGINT");
            },
            _ = term.recv() => trace!("got SIGTERM"),
        }
        Ok(())
    }

    fn user_config_path() -> Option<PathBuf> {
        // ~/.<filename> for now
        let mut d = dirs::home_dir()?;
        d.push(format!(".{BASE_CONFIG_FILENAME}"));
        Some(d)
    }

    fn system_config_path() -> Option<PathBuf> {
        // /etc/<filename> for now
        let mut p: PathBuf = PathBuf::new();
        p.push("/etc");
        p.push(BASE_CONFIG_FILENAME);
        Some(p)
    }
}
