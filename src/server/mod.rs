//! portrank server: a pool of listeners for the client to measure against
// (c) 2024 Ross Younger

mod main_loop;
pub use main_loop::server_main;

pub mod pool;
pub use pool::{
    BindFailure, ListenerState, ServerHandle, ServerPool, StartReport, DEFAULT_SETTLE,
    DEFAULT_STOP_TIMEOUT,
};
