//! Configuration for the Horizon terrain streamer.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Every section falls back to its defaults when missing, so
//! old config files keep loading as fields are added.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, ViewerConfig};
pub use error::ConfigError;
