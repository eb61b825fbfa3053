//! Logger initialization.
//!
//! Everything else logs through the `log` facade; this module only wires up
//! `env_logger` once per process.

mod init;

pub use init::{init_logging, LoggingConfig};
