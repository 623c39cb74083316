//! A pool of listener processes
// (c) 2024 Ross Younger

use std::{collections::HashSet, process::ExitStatus, time::Duration};

use rand::Rng;
use tokio::{process::Child, time::timeout};
use tracing::{debug, trace, warn};

use crate::{
    os::{AbstractPlatform as _, Platform},
    planner::{PortCandidate, PortPlanner},
    tool::MeasurementTool,
};

/// Default time a listener must survive before we believe it bound successfully
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(80);
/// Default time we allow a listener to exit gracefully before killing it
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Whether a listener is still running, as far as we know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Running
    Running,
    /// Exited, or stopped by us
    Stopped,
}

/// A listener process on a single port
#[derive(Debug)]
pub struct ServerHandle {
    port: u16,
    child: Child,
    state: ListenerState,
}

impl ServerHandle {
    /// The port this listener serves
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Last known state. See also [`ServerHandle::is_alive`].
    #[must_use]
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Checks whether the process is still running, updating our state
    pub fn is_alive(&mut self) -> bool {
        if self.state == ListenerState::Stopped {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("listener on port {} exited ({status})", self.port);
                self.state = ListenerState::Stopped;
                false
            }
            Err(e) => {
                warn!("could not check listener on port {}: {e}", self.port);
                true
            }
        }
    }

    fn request_stop(&mut self) {
        if self.is_alive() {
            if let Err(e) = Platform::request_termination(&self.child) {
                warn!("port {}: {e:#}", self.port);
            }
        }
    }

    /// Waits up to `limit` for the process to exit, then kills it
    async fn finish(&mut self, limit: Duration) {
        if self.state == ListenerState::Stopped {
            return;
        }
        match timeout(limit, self.child.wait()).await {
            Ok(Ok(status)) => trace!("listener on port {} stopped ({status})", self.port),
            Ok(Err(e)) => warn!("waiting for listener on port {}: {e}", self.port),
            Err(_) => {
                warn!(
                    "listener on port {} did not stop within {limit:?}; killing it",
                    self.port
                );
                if let Err(e) = self.child.kill().await {
                    warn!("killing listener on port {}: {e}", self.port);
                }
            }
        }
        self.state = ListenerState::Stopped;
    }
}

/// Why a listener could not be started on a port
#[derive(Debug, thiserror::Error)]
pub enum BindFailure {
    /// We could not launch or supervise the process
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The process died during the settle period (port in use, permission denied...)
    #[error("listener exited immediately ({0})")]
    ExitedEarly(ExitStatus),
}

/// What happened during [`ServerPool::start`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    /// Ports successfully started, in the order they were started
    pub started: Vec<u16>,
    /// Required ports which failed to bind
    pub failed_required: Vec<u16>,
    /// Total number of failed attempts
    pub failed: usize,
}

/// The registry of listener processes.
///
/// Every process started by the pool is owned by it until [`ServerPool::stop`].
/// Processes are registered as soon as they are known to be alive, so an interrupted
/// [`ServerPool::start`] still leaves them here to be stopped.
/// If the pool is dropped without being stopped, any processes still running are killed outright.
#[derive(Debug)]
pub struct ServerPool {
    handles: Vec<ServerHandle>,
    settle: Duration,
    stop_timeout: Duration,
}

impl Default for ServerPool {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE, DEFAULT_STOP_TIMEOUT)
    }
}

impl ServerPool {
    /// Creates an empty pool
    #[must_use]
    pub fn new(settle: Duration, stop_timeout: Duration) -> Self {
        Self {
            handles: Vec::new(),
            settle,
            stop_timeout,
        }
    }

    /// The listeners in the pool
    #[must_use]
    pub fn handles(&self) -> &[ServerHandle] {
        &self.handles
    }

    /// Ports served by the pool, in the order they were started
    #[must_use]
    pub fn ports(&self) -> Vec<u16> {
        self.handles.iter().map(ServerHandle::port).collect()
    }

    /// Number of listeners in the pool (running or not)
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Is the pool empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of listeners still running
    pub fn running(&mut self) -> usize {
        self.handles
            .iter_mut()
            .map(ServerHandle::is_alive)
            .filter(|alive| *alive)
            .count()
    }

    async fn try_start<T: MeasurementTool>(&mut self, tool: &T, port: u16) -> Result<(), BindFailure> {
        let mut child = tool.start_listener(port)?;
        tokio::time::sleep(self.settle).await;
        if let Some(status) = child.try_wait()? {
            return Err(BindFailure::ExitedEarly(status));
        }
        trace!("listener started on port {port}");
        self.handles.push(ServerHandle {
            port,
            child,
            state: ListenerState::Running,
        });
        Ok(())
    }

    /// Starts listeners until `target` of them are running.
    ///
    /// Candidates are tried in order, one at a time. A port is never tried twice.
    /// If the candidates run out first and a planner is given, further ports are drawn
    /// from it, up to its attempt cap.
    pub async fn start<T: MeasurementTool, R: Rng>(
        &mut self,
        tool: &T,
        candidates: &[PortCandidate],
        target: usize,
        refill: Option<&mut PortPlanner<R>>,
    ) -> StartReport {
        let mut report = StartReport::default();
        let mut attempted: HashSet<u16> = self.handles.iter().map(ServerHandle::port).collect();

        for candidate in candidates {
            if report.started.len() >= target {
                break;
            }
            if !attempted.insert(candidate.port) {
                continue;
            }
            if !self.attempt(tool, candidate.port, &mut report).await && candidate.required {
                report.failed_required.push(candidate.port);
            }
        }

        if let Some(planner) = refill {
            let mut attempts = 0;
            while report.started.len() < target && attempts < planner.max_attempts() {
                attempts += 1;
                let port = planner.draw();
                if attempted.insert(port) {
                    let _ = self.attempt(tool, port, &mut report).await;
                }
            }
            if report.started.len() < target {
                warn!(
                    "gave up looking for more ports after {attempts} attempts; started {} of {target}",
                    report.started.len()
                );
            }
        }
        report
    }

    /// Returns true if the listener started
    async fn attempt<T: MeasurementTool>(
        &mut self,
        tool: &T,
        port: u16,
        report: &mut StartReport,
    ) -> bool {
        match self.try_start(tool, port).await {
            Ok(()) => {
                report.started.push(port);
                true
            }
            Err(e) => {
                debug!("could not start listener on port {port}: {e}");
                report.failed += 1;
                false
            }
        }
    }

    /// Stops every listener: first asks them all to exit, then waits for each in turn,
    /// killing any which outstay the stop timeout.
    ///
    /// This is safe to call more than once.
    pub async fn stop(&mut self) {
        for handle in &mut self.handles {
            handle.request_stop();
        }
        let limit = self.stop_timeout;
        for handle in &mut self.handles {
            handle.finish(limit).await;
        }
    }
}

impl Drop for ServerPool {
    fn drop(&mut self) {
        for handle in &mut self.handles {
            if handle.state == ListenerState::Running {
                warn!("listener on port {} was not stopped; killing it", handle.port);
                let _ = handle.child.start_kill();
                handle.state = ListenerState::Stopped;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashSet,
        time::{Duration, Instant},
    };

    use rand::{rngs::StdRng, SeedableRng as _};

    use super::{ListenerState, ServerPool};
    use crate::{
        planner::{PortCandidate, PortPlanner},
        tool::testing::ScriptedTool,
    };

    fn candidates(required: &[u16], others: &[u16]) -> Vec<PortCandidate> {
        required
            .iter()
            .map(|&port| PortCandidate {
                port,
                required: true,
            })
            .chain(others.iter().map(|&port| PortCandidate {
                port,
                required: false,
            }))
            .collect()
    }

    fn no_refill() -> Option<&'static mut PortPlanner<StdRng>> {
        None
    }

    fn pool() -> ServerPool {
        ServerPool::new(Duration::from_millis(80), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn failed_required_port_is_reported_and_refilled() {
        let tool = ScriptedTool::default().busy(80);
        let mut planner = PortPlanner::new(StdRng::seed_from_u64(1), 100);
        let mut uut = pool();
        let report = uut
            .start(&tool, &candidates(&[443, 80], &[]), 4, Some(&mut planner))
            .await;

        assert_eq!(report.started.len(), 4);
        assert_eq!(report.started[0], 443);
        assert_eq!(report.failed_required, [80]);
        assert_eq!(report.failed, 1);
        assert_eq!(uut.ports(), report.started);
        assert_eq!(uut.running(), 4);

        uut.stop().await;
        assert_eq!(uut.running(), 0);
    }

    #[tokio::test]
    async fn stops_at_target() {
        let tool = ScriptedTool::default();
        let mut uut = pool();
        let report = uut
            .start(&tool, &candidates(&[], &[5001, 5002, 5003, 5004]), 2, no_refill())
            .await;
        assert_eq!(report.started, [5001, 5002]);
        assert_eq!(uut.len(), 2);
        uut.stop().await;
    }

    #[tokio::test]
    async fn never_two_handles_on_one_port() {
        let tool = ScriptedTool::default();
        let mut uut = pool();
        let report = uut
            .start(
                &tool,
                &candidates(&[6000], &[6000, 6001, 6001, 6000]),
                10,
                no_refill(),
            )
            .await;
        assert_eq!(report.started, [6000, 6001]);
        assert_eq!(report.failed, 0);

        // A second start does not reuse ports already in the pool either
        let report = uut
            .start(&tool, &candidates(&[], &[6001, 6002]), 10, no_refill())
            .await;
        assert_eq!(report.started, [6002]);
        let unique: HashSet<_> = uut.ports().into_iter().collect();
        assert_eq!(unique.len(), uut.len());
        uut.stop().await;
    }

    #[tokio::test]
    async fn refill_is_bounded() {
        let tool = ScriptedTool::default().all_busy();
        let mut planner = PortPlanner::new(StdRng::seed_from_u64(2), 5);
        let mut uut = pool();
        let report = uut
            .start(&tool, &candidates(&[443], &[]), 100, Some(&mut planner))
            .await;
        assert!(report.started.is_empty());
        assert!(uut.is_empty());
        assert_eq!(report.failed_required, [443]);
        // 1 candidate plus at most 5 refill draws
        assert!(report.failed >= 2 && report.failed <= 6);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let tool = ScriptedTool::default();
        let mut uut = pool();
        let _ = uut
            .start(&tool, &candidates(&[7000, 7001], &[]), 2, no_refill())
            .await;
        assert_eq!(uut.running(), 2);
        uut.stop().await;
        uut.stop().await;
        assert_eq!(uut.running(), 0);
        assert!(uut
            .handles()
            .iter()
            .all(|h| h.state() == ListenerState::Stopped));
    }

    #[tokio::test]
    async fn stop_on_empty_pool() {
        let mut uut = pool();
        uut.stop().await;
        assert_eq!(uut.running(), 0);
    }

    #[tokio::test]
    async fn stragglers_are_killed() {
        let tool = ScriptedTool::default().stubborn();
        let mut uut = ServerPool::new(Duration::from_millis(80), Duration::from_millis(200));
        let report = uut
            .start(&tool, &candidates(&[8000], &[]), 1, no_refill())
            .await;
        assert_eq!(report.started, [8000]);
        let started = Instant::now();
        uut.stop().await;
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(uut.running(), 0);
    }

    #[tokio::test]
    async fn listener_which_dies_later_is_noticed() {
        let tool = ScriptedTool::default();
        let mut uut = pool();
        let _ = uut
            .start(&tool, &candidates(&[9000], &[]), 1, no_refill())
            .await;
        let pid = uut.handles()[0].child.id().unwrap();
        nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(i32::try_from(pid).unwrap()),
            nix::sys::signal::Signal::SIGKILL,
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(uut.running(), 0);
        uut.stop().await;
    }
}
