// (c) 2024 Ross Younger

//! Finds the TCP ports which carry the most traffic between two machines.
//!
//! portrank drives [iperf3](https://iperf.fr/) to measure throughput in both directions
//! on each of a set of ports, then ranks the ports by their bottleneck direction.
//! This is useful when choosing which ports to run a tunnel over: middleboxes often
//! shape traffic differently by port.
//!
//! ## Usage
//!
//! On the far machine, start a pool of listeners:
//! ```text
//! $ portrank --mode server --multi
//! 443,80,9999,2053,2095,2086,31547,...
//! ```
//! The listeners run until you press Ctrl-C.
//!
//! On the near machine, measure the ports the server printed:
//! ```text
//! $ portrank --mode client --multi --host far.example.com --ports 443,80,9999,...
//! ```
//! The client measures each port in turn (never concurrently, as parallel measurements
//! over the same path would disturb each other) and prints the best few.
//!
//! Without `--multi`, both sides work with a single port (`--port`, default 9777).
//!
//! ## How ports are scored
//!
//! Each port gets two probes: downlink (server to client) then uplink (client to server).
//! The port's score is the lower of the two, in Mbps.
//! A port whose probes fail in either direction is reported as failed, never half-measured.
//!
//! | Score | Quality |
//! | --- | --- |
//! | 200 Mbps or more | excellent |
//! | 150 to 200 | good |
//! | 100 to 150 | moderate |
//! | under 100 | poor |
//!
//! The thresholds are configurable; see [config].
//!
//! ## Library structure
//!
//! * [planner] chooses candidate ports
//! * [server] runs and tears down the pool of listeners
//! * [client] measures, ranks and classifies ports
//! * [tool] wraps the external measurement tool

mod cli;
pub use cli::cli;
pub mod client;
pub mod config;
/// OS abstraction layer
pub mod os;
pub mod planner;
pub mod server;
pub mod tool;
/// Utilities
pub mod util;

// Required by derive-deftly for exported templates
#[doc(hidden)]
pub use derive_deftly;
