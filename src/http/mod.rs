//! HTTP client module
//!
//! Provides the HTTP client with retry, rate limiting, and backoff
//! strategies.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff, up to a
//!   fixed attempt ceiling
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Credential Injection**: Bearer tokens from the auth module's cache,
//!   with one transparent re-exchange after a rejected request

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
