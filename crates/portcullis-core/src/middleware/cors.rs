//! In-gateway CORS preflight handling.
//!
//! An explicit `OPTIONS` responder rather than a response-header-only
//! middleware — the pipeline needs to short-circuit preflight requests
//! before routing, rate limiting, or auth ever run, which a
//! response-only middleware can't do.

use actix_web::{HttpRequest, HttpResponse};

pub fn is_preflight(req: &HttpRequest) -> bool {
    req.method() == actix_web::http::Method::OPTIONS
}

pub fn preflight_response() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .insert_header(("Access-Control-Allow-Methods", "GET, HEAD, POST, PUT, PATCH, DELETE, OPTIONS"))
        .insert_header(("Access-Control-Allow-Headers", "Authorization, Content-Type"))
        .insert_header(("Access-Control-Max-Age", "600"))
        .finish()
}
