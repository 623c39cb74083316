//! portrank client: measures ports on a server and ranks them
// (c) 2024 Ross Younger

mod main_loop;
pub mod measure;
pub mod quality;
pub mod ranking;
pub mod report;
pub mod session;

pub(crate) use main_loop::client_main;
pub use measure::{measure, MeasureError, MeasurementResult};
pub use quality::{Quality, QualityThresholds};
pub use ranking::{rank, PortFailure, RankedReport};
pub use session::{BenchmarkSession, SessionFailure};
