//! `bucket/key` object addressing.

use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

/// An object address written as `bucket/key/with/slashes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Key flattened into a single path segment (`a/b/c.mp4` becomes `a-b-c.mp4`).
    pub fn flat_file_name(&self) -> String {
        self.key.replace('/', "-")
    }
}

impl FromStr for ObjectLocation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('/');
        match s.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(bucket, key))
            }
            _ => Err(StorageError::InvalidLocation(s.to_string())),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}
