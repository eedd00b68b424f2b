//! Utility modules.

/// Timestamp (de)serialization for API response fields.
pub mod datetime;

/// Keeps request bodies and credentials out of logs.
pub mod log_sanitizer;
