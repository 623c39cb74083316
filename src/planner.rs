//! Port candidate planning
// (c) 2024 Ross Younger

use std::{collections::HashSet, ops::RangeInclusive};

use rand::{rngs::StdRng, Rng, SeedableRng as _};
use tracing::warn;

/// Ports we draw at random from. This avoids the privileged ports.
pub const RANDOM_PORTS: RangeInclusive<u16> = 1024..=65535;

/// Default cap on random draws, for planning and for refilling a pool
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// A port we intend to try
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortCandidate {
    /// Port number
    pub port: u16,
    /// Whether this port came from the required set
    pub required: bool,
}

/// Builds port candidate lists from a required set plus random fill.
///
/// The random source is injectable so that plans are reproducible under test.
#[derive(Debug)]
pub struct PortPlanner<R: Rng = StdRng> {
    rng: R,
    max_attempts: u32,
}

impl PortPlanner<StdRng> {
    /// Creates a planner seeded from the operating system
    #[must_use]
    pub fn from_entropy(max_attempts: u32) -> Self {
        Self::new(StdRng::from_entropy(), max_attempts)
    }
}

impl<R: Rng> PortPlanner<R> {
    /// Creates a planner with the given random source and attempt cap
    #[must_use]
    pub fn new(rng: R, max_attempts: u32) -> Self {
        Self { rng, max_attempts }
    }

    /// The cap on random draws
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draws one port uniformly from [`RANDOM_PORTS`]
    pub fn draw(&mut self) -> u16 {
        self.rng.gen_range(RANDOM_PORTS)
    }

    /// Plans a list of `max(target, required.len())` unique ports.
    ///
    /// The required ports come first, in the order given, with invalid (0) and
    /// repeated ports dropped. The remainder are drawn at random, skipping any
    /// already chosen.
    ///
    /// At most `max_attempts` random draws are made. If that is not enough, the
    /// list is returned short.
    pub fn plan(&mut self, required: &[u16], target: usize) -> Vec<PortCandidate> {
        let target = target.max(required.len());
        let mut seen = HashSet::with_capacity(target);
        let mut out = Vec::with_capacity(target);

        for &port in required {
            if port != 0 && seen.insert(port) {
                out.push(PortCandidate {
                    port,
                    required: true,
                });
            }
        }

        let mut attempts = 0;
        while out.len() < target {
            if attempts >= self.max_attempts {
                warn!(
                    "gave up planning ports after {attempts} attempts; have {} of {target}",
                    out.len()
                );
                break;
            }
            attempts += 1;
            let port = self.draw();
            if seen.insert(port) {
                out.push(PortCandidate {
                    port,
                    required: false,
                });
            }
        }
        out
    }
}
