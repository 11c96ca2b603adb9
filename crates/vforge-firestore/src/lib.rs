//! Firestore REST client and plan entitlement lookup.
//!
//! Provides token caching, retry with backoff, request metrics and the
//! [`EntitlementSource`] capability used to authorize processing requests.

pub mod client;
pub mod entitlements;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use entitlements::EntitlementSource;
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use token_cache::{StaticToken, TokenCache, TokenSource};
pub use types::Document;
