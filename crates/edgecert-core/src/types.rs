//! Custom types for common data structures

use chrono::{DateTime, Utc};

/// Standard UTC DateTime type used across all edgecert crates
///
/// Serializes as ISO 8601 with a 'Z' suffix.
pub type UtcDateTime = DateTime<Utc>;
