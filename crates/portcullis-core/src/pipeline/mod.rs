//! Request ingress pipeline: the single place requests flow through.
//!
//! Per the "middleware chain is a simple composition of functions" design
//! note (see DESIGN.md), this is one `async fn` rather than a stack of
//! `actix_web::dev::Transform` middlewares — no cyclic dependency between
//! auth/routing/rate-limiting like an ordered middleware stack would invite.

pub mod ingress;

pub use ingress::{GatewayState, handle_request};
