//! Structured logging with optional rotating file output.
//!
//! Every layer of the crate logs through `tracing` with structured fields.
//! This module installs the subscriber that turns those events into JSON lines.
//!
//! # Architecture
//!
//! ```text
//! tracing macros → EnvFilter → fmt JSON layer → RotatingFileWriter | stderr
//! ```
//!
//! # Features
//!
//! - **File Output**: JSON lines in `<data dir>/watch-history.log` when configured
//! - **Automatic Rotation**: Files rotate at 10MB with 3-backup retention
//! - **Span Context**: Store worker spans nest under the caller's span
//!
//! # Configuration
//!
//! Log level is controlled via:
//! 1. `RUST_LOG` environment variable (highest priority)
//! 2. `log_level` option in the configuration file
//! 3. Default: `"info"`
//!
//! # Modules
//!
//! - `init`: Subscriber setup
//! - `file_writer`: Rotating file writer with size-based rotation

mod file_writer;
mod init;

pub use file_writer::RotatingFileWriter;
pub use init::init_tracing;
