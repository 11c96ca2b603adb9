//! Cloudflare R2 durable artifact storage.
//!
//! This crate provides:
//! - File upload and object deletion against R2's S3 API
//! - Object key and public URI mapping
//! - The [`DurableStore`] capability used by fan-out and preview uploads

pub mod client;
pub mod error;
pub mod keys;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::DurableStore;
