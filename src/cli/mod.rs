//! Command Line Interface for portrank
// (c) 2024 Ross Younger
mod args;
mod cli_main;
pub(crate) mod styles;
pub(crate) use args::CliArgs;
pub use cli_main::cli;
