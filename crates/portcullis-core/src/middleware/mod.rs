//! Cross-cutting request/response concerns that sit outside the main pipeline.
//!
//! - [`security`] — static response security headers, applied via `.wrap()`
//! - [`cors`] — preflight short-circuiting, called directly from
//!   [`crate::pipeline::ingress`] rather than wrapped, since it needs to run
//!   before routing/auth/rate-limiting even begin

pub mod cors;
pub mod security;
