//! S3-compatible CDN storage client.
//!
//! This crate provides:
//! - `bucket/key` object addressing
//! - Presigned GET URLs for sources
//! - File upload for finished outputs

pub mod client;
pub mod error;
pub mod location;

pub use client::{CdnClient, CdnConfig, ObjectStore};
pub use error::{StorageError, StorageResult};
pub use location::ObjectLocation;
