//! Authenticated caller identity.
//!
//! A [`Principal`] is produced by [`crate::services::token_validator`] when a
//! bearer token validates successfully. Its absence (`None` in the pipeline)
//! represents an anonymous caller, which is only acceptable on routes with
//! `requires_auth = false`.

use ahash::AHashSet;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: AHashSet<String>,
    pub name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    /// True if the principal's roles overlap the route's required roles.
    /// An empty `required` set means "any authenticated principal suffices".
    pub fn satisfies_roles(&self, required: Option<&AHashSet<String>>) -> bool {
        match required {
            None => true,
            Some(required) if required.is_empty() => true,
            Some(required) => self.roles.iter().any(|r| required.contains(r)),
        }
    }
}
