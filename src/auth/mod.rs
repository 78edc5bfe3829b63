//! Authentication module
//!
//! Wellspring speaks one auth shape: a pre-shared secret exchanged once per
//! run for a bearer token. The `TokenCache` performs the exchange lazily,
//! caches the credential, and re-exchanges only when the HTTP client
//! invalidates it after a rejected data request.

mod token_cache;
mod types;

pub use token_cache::{extract_field, TokenCache};
pub use types::Credential;
