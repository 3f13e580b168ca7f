//! Infrastructure layer for filesystem and environment interactions.
//!
//! This module resolves where the history store, configuration, and logs live
//! on the current platform.

pub mod paths;

pub use paths::{data_dir, default_config_path, expand_tilde, resolve};
