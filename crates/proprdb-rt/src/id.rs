//! Object identifiers and timestamps.
//!
//! Objects are keyed by UUIDv7 in canonical lowercase text form, so
//! identifiers sort roughly by creation time. Update timestamps are
//! Unix-epoch nanoseconds.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ProprError, Result};

/// Current wall-clock time as Unix-epoch nanoseconds.
pub fn now_ns() -> i64 {
    Utc::now()
        .timestamp_nanos_opt()
        .expect("wall clock outside the i64 nanosecond range")
}

/// Allocate a fresh UUIDv7 in canonical lowercase form.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().as_hyphenated().to_string()
}

/// Validate that `id` has the canonical 8-4-4-4-12 hex shape.
///
/// Either hex case is accepted; everything else (braced, simple, URN forms)
/// is rejected.
pub fn validate_uuid(id: &str) -> Result<()> {
    if id.len() == 36 && Uuid::try_parse(id).is_ok() {
        Ok(())
    } else {
        Err(ProprError::InvalidUuid(id.to_string()))
    }
}
