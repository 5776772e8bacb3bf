//! Logging utilities.
//!
//! This module centralizes logger initialization. Library code only talks to
//! the `log` facade; binaries and tests install `env_logger` through here.

mod init;

pub use init::{init_logging, LoggingConfig};
