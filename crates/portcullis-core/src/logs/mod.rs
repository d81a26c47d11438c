//! Logging setup.
//!
//! - [`logger`] - structured, column-aligned `env_logger` configuration

pub mod logger;
