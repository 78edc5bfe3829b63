//! Credential types
//!
//! The token exchange reduces to a single opaque bearer token; the
//! acquisition time is kept alongside for logging.

use chrono::{DateTime, Utc};

/// A bearer credential obtained from the token exchange
#[derive(Debug, Clone)]
pub struct Credential {
    /// The access token sent as `Bearer` on data requests
    pub token: String,
    /// When the exchange that produced this token completed
    pub obtained_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential obtained now
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            obtained_at: Utc::now(),
        }
    }

    /// Age of this credential
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.obtained_at
    }
}
