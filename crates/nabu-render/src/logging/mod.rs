//! Logging setup.
//!
//! The crate itself only talks to the `log` facade. This module offers a
//! one-call `env_logger` setup for binaries and tools built on top of it.

mod init;

pub use init::{init_logging, LoggingConfig};
