//! Log sanitization
//!
//! Response bodies can be large (vault listings, alarm policies) and signed headers
//! carry credentials. Both are shortened or masked before they reach a log line.

/// Maximum number of bytes of a body kept in a log line.
const TRUNCATE_LIMIT: usize = 256;

/// Headers whose values are never logged.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "x-auth-token", "x-security-token"];

/// MSRV-compatible replacement for `str::floor_char_boundary` (stable since 1.91.0).
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// Truncate a string for logging.
///
/// Strings within the limit are returned unchanged. Longer ones keep the first
/// `TRUNCATE_LIMIT` bytes (on a char boundary) plus a note with the total length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

/// Value to log for a request header: credentials are masked.
pub fn header_for_log<'a>(name: &str, value: &'a str) -> &'a str {
    if SENSITIVE_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
    {
        "***"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_body_unchanged() {
        let s = r#"{"vpc":{"id":"abc"}}"#;
        assert_eq!(truncate_for_log(s), s);
    }

    #[test]
    fn exactly_at_limit() {
        let s = "a".repeat(TRUNCATE_LIMIT);
        assert_eq!(truncate_for_log(&s), s);
    }

    #[test]
    fn long_body_truncated_with_length() {
        let s = "v".repeat(TRUNCATE_LIMIT + 44);
        let result = truncate_for_log(&s);
        assert!(result.ends_with("... [truncated, total 300 bytes]"));
        assert!(result.len() < s.len());
    }

    #[test]
    fn multibyte_boundary_respected() {
        // 3-byte chars never land exactly on the limit
        let s = "é中".repeat(100);
        let result = truncate_for_log(&s);
        assert!(result.contains("... [truncated, total"));
    }

    #[test]
    fn credentials_masked() {
        assert_eq!(header_for_log("Authorization", "SDK-HMAC-SHA256 ..."), "***");
        assert_eq!(header_for_log("X-Security-Token", "tok"), "***");
        assert_eq!(header_for_log("X-Project-Id", "p1"), "p1");
    }
}
