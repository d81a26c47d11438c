//! Small, focused utility helpers shared across services.
//!
//! - [`path`] - upstream URL construction

pub mod path;
