//! Logging setup.
//!
//! The crate logs through the `log` facade: interpreter GPU calls at
//! `debug`, queue pruning at `trace`, recoverable oddities at `warn`.
//! Binaries call [`init_logging`] once to install `env_logger`.

mod init;

pub use init::{init_logging, LoggingConfig};
