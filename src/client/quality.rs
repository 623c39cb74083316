//! Connection quality tiers
// (c) 2024 Ross Younger

use strum::Display;

/// Floor throughput (Mbps) at or above which a connection is excellent
pub const EXCELLENT_MBPS: f64 = 200.0;
/// Floor throughput (Mbps) at or above which a connection is good
pub const GOOD_MBPS: f64 = 150.0;
/// Floor throughput (Mbps) below which a connection is poor
pub const POOR_MBPS: f64 = 100.0;

/// How useful a port is for tunneling, judged by its bottleneck direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Quality {
    /// Floor at or above the excellent threshold
    Excellent,
    /// Floor between the good and excellent thresholds
    Good,
    /// Neither good nor poor
    Moderate,
    /// Floor below the poor threshold
    Poor,
}

impl Quality {
    /// Advice for the user
    #[must_use]
    pub fn verdict(self) -> &'static str {
        match self {
            Quality::Excellent => {
                "Direct connectivity quality is excellent. Servers can be tunneled."
            }
            Quality::Good => "Direct connectivity quality is good. Servers can be tunneled.",
            Quality::Moderate => "Direct connectivity is moderate. Tunnel can work, but quality may vary by route and load.",
            Quality::Poor => "Direct connectivity is weak. Swap the server and client roles and test again.",
        }
    }
}

/// The thresholds which map a throughput floor to a [`Quality`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    /// Lower bound (inclusive) of [`Quality::Excellent`]
    pub excellent: f64,
    /// Lower bound (inclusive) of [`Quality::Good`]
    pub good: f64,
    /// Upper bound (exclusive) of [`Quality::Poor`]
    pub poor: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: EXCELLENT_MBPS,
            good: GOOD_MBPS,
            poor: POOR_MBPS,
        }
    }
}

impl QualityThresholds {
    /// Classifies a connection by the lesser of its two directions (Mbps)
    #[must_use]
    pub fn classify(&self, uplink: f64, downlink: f64) -> Quality {
        let floor = uplink.min(downlink);
        if floor >= self.excellent {
            Quality::Excellent
        } else if floor >= self.good {
            Quality::Good
        } else if floor < self.poor {
            Quality::Poor
        } else {
            Quality::Moderate
        }
    }
}
