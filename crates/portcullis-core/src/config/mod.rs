//! Configuration loading and validation for the Portcullis gateway.
//!
//! - [`settings`] - YAML configuration schema and the hardened file loader
//! - [`validation`] - Structural, security, and performance validation of loaded settings

pub mod settings;
pub mod validation;
