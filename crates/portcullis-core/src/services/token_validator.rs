//! Bearer token validation, producing an optional [`Principal`].
//!
//! Unlike the actix-web `Transform`/`Service` JWT middleware this is adapted
//! from, this validator never itself rejects a request: it either resolves a
//! bearer token to a [`Principal`] or returns `None` for a missing/invalid
//! token, leaving admission decisions to
//! [`crate::services::route_matcher`]/the ingress pipeline, per
//! `requires_auth` and `required_roles` on the matched route.

use crate::config::settings::{is_production, JwtSection};
use crate::models::principal::Principal;
use ahash::AHashSet;
use actix_web::HttpRequest;
use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    #[serde(default)]
    iat: usize,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Error)]
pub enum TokenValidationError {
    #[error("missing or malformed Authorization header")]
    MissingOrMalformed,
    #[error("token validation failed: {0}")]
    Invalid(String),
}

/// Clock skew tolerance applied to `exp`/`iat` comparisons.
const CLOCK_SKEW_SECONDS: u64 = 60;

pub struct TokenValidator {
    /// `None` means the validator is disabled (no secret configured,
    /// non-production environment) and every request resolves to anonymous.
    decoding_key: Option<DecodingKey>,
    issuer: Option<String>,
    audience: Option<String>,
    validate_issuer: bool,
    validate_audience: bool,
    validate_lifetime: bool,
    validate_issuer_signing_key: bool,
}

impl TokenValidator {
    /// Builds a validator from the `jwt` config section. Fails at startup if
    /// production is active and no secret is configured, per spec §6 exit
    /// codes; the caller (gateway bootstrap) is expected to treat `Err` as fatal.
    pub fn from_config(jwt: &JwtSection) -> Result<Self, String> {
        let configured_secret = jwt.secret.as_ref().filter(|s| !s.is_empty());

        match configured_secret {
            Some(secret) => Ok(Self {
                decoding_key: Some(DecodingKey::from_secret(secret.as_bytes())),
                issuer: jwt.issuer.clone(),
                audience: jwt.audience.clone(),
                validate_issuer: jwt.validate_issuer,
                validate_audience: jwt.validate_audience,
                validate_lifetime: jwt.validate_lifetime,
                validate_issuer_signing_key: jwt.validate_issuer_signing_key,
            }),
            None if is_production() => {
                Err("jwt.secret is required when PORTCULLIS_ENV=production".to_string())
            }
            None => {
                warn!(
                    "No jwt.secret configured; token validation is disabled and all callers are anonymous \
                     (this is only permitted outside production)"
                );
                Ok(Self {
                    decoding_key: None,
                    issuer: None,
                    audience: None,
                    validate_issuer: true,
                    validate_audience: true,
                    validate_lifetime: true,
                    validate_issuer_signing_key: true,
                })
            }
        }
    }

    /// Extracts and validates a bearer token from the request, if present.
    /// Returns `Ok(None)` for a caller with no/invalid token — the route
    /// matcher, not this function, decides whether that is acceptable.
    pub fn validate(&self, req: &HttpRequest) -> Option<Principal> {
        let Some(decoding_key) = &self.decoding_key else {
            return None;
        };

        let token = match extract_bearer_token(req) {
            Ok(token) => token,
            Err(e) => {
                debug!("no usable bearer token: {}", e);
                return None;
            }
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_SECONDS;
        validation.validate_exp = self.validate_lifetime;
        if !self.validate_issuer_signing_key {
            validation.insecure_disable_signature_validation();
        }
        if self.validate_issuer {
            if let Some(issuer) = &self.issuer {
                validation.set_issuer(&[issuer]);
            }
        }
        if self.validate_audience {
            if let Some(audience) = &self.audience {
                validation.set_audience(&[audience]);
            }
        }

        match decode::<Claims>(&token, decoding_key, &validation) {
            Ok(data) => {
                let claims = data.claims;
                let expires_at = Utc.timestamp_opt(claims.exp as i64, 0).single().unwrap_or_else(Utc::now);
                Some(Principal {
                    user_id: claims.sub,
                    email: claims.email,
                    name: claims.name,
                    roles: claims.roles.into_iter().collect::<AHashSet<_>>(),
                    expires_at,
                })
            }
            Err(e) => {
                debug!("bearer token rejected: {}", e);
                None
            }
        }
    }
}

fn extract_bearer_token(req: &HttpRequest) -> Result<String, TokenValidationError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or(TokenValidationError::MissingOrMalformed)?;
    let value = header.to_str().map_err(|_| TokenValidationError::MissingOrMalformed)?;
    value
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
        .ok_or(TokenValidationError::MissingOrMalformed)
}
