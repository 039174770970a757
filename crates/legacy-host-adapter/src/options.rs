//! Adapter configuration

use serde::{Deserialize, Serialize};

/// First major server version whose vault accepts transactional uploads
pub const TRANSACTIONAL_UPLOAD_MIN_MAJOR: u32 = 11;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    pub transactional_upload_min_major: u32,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            transactional_upload_min_major: TRANSACTIONAL_UPLOAD_MIN_MAJOR,
        }
    }
}
