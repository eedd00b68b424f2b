use serde::{Deserialize, Serialize};

/// Unified error type for every SDK call.
///
/// Each variant that originates from the wire carries a `service` field naming the
/// catalog entry that produced it (`vpc`, `dns`, `asm`, ...).
///
/// # Retryable Errors
///
/// The following variants represent transient failures that may succeed on retry:
/// - [`NetworkError`](Self::NetworkError) — connectivity issues and HTTP 502/503/504
/// - [`Timeout`](Self::Timeout) — request timed out
/// - [`RateLimited`](Self::RateLimited) — HTTP 429 or gateway flow control
///
/// The built-in HTTP executor retries these with exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum SdkError {
    /// A network-level error occurred (DNS resolution failure, connection refused, 5xx gateway).
    NetworkError {
        /// Service that produced the error.
        service: String,
        /// Error details.
        detail: String,
    },

    /// The HTTP request timed out.
    Timeout {
        /// Service that produced the error.
        service: String,
        /// Error details.
        detail: String,
    },

    /// The API rate limit has been exceeded.
    RateLimited {
        /// Service that produced the error.
        service: String,
        /// Suggested wait time in seconds, taken from `Retry-After`.
        retry_after: Option<u64>,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The credentials were rejected by the API gateway.
    InvalidCredentials {
        /// Service that produced the error.
        service: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The authenticated principal lacks permission for the operation.
    PermissionDenied {
        /// Service that produced the error.
        service: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The tenant quota has been exceeded.
    QuotaExceeded {
        /// Service that produced the error.
        service: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The addressed resource does not exist (HTTP 404 or a code mapped to it).
    ResourceNotFound {
        /// Service that produced the error.
        service: String,
        /// Request URL.
        url: String,
        /// Original error message from the API, if available.
        raw_message: Option<String>,
    },

    /// The response status was not in the accepted set.
    UnexpectedStatus {
        /// Service that produced the error.
        service: String,
        /// HTTP method.
        method: String,
        /// Request URL.
        url: String,
        /// Received status.
        status: u16,
        /// Accepted statuses for this request.
        expected: Vec<u16>,
        /// Service error code (`error_code` / `code`), if the body carried one.
        error_code: Option<String>,
        /// Raw response body.
        body: String,
    },

    /// A field marked as required was absent or zero when building a request.
    MissingRequiredField {
        /// Serialized field name.
        field: String,
    },

    /// Exactly one of two mutually exclusive fields must be set.
    XorViolation {
        /// The pair of serialized field names.
        fields: Vec<String>,
    },

    /// At least one of a group of fields must be set.
    OrViolation {
        /// The group of serialized field names.
        fields: Vec<String>,
    },

    /// A request parameter is invalid.
    InvalidParameter {
        /// Service that produced the error.
        service: String,
        /// Name of the invalid parameter.
        param: String,
        /// Description of what's wrong.
        detail: String,
    },

    /// The service name is not in the catalog.
    UnknownService {
        /// The requested service name.
        service: String,
    },

    /// Failed to parse a response body.
    ParseError {
        /// Service that produced the error.
        service: String,
        /// Details about the parse failure.
        detail: String,
    },

    /// Failed to serialize a request body.
    SerializationError {
        /// Service that produced the error.
        service: String,
        /// Details about the serialization failure.
        detail: String,
    },

    /// An unrecognized error from the API.
    Unknown {
        /// Service that produced the error.
        service: String,
        /// Raw error code from the API, if available.
        raw_code: Option<String>,
        /// Raw error message from the API.
        raw_message: String,
    },
}

impl SdkError {
    /// Whether the error means the addressed resource is gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
            || matches!(self, Self::UnexpectedStatus { status: 404, .. })
    }

    /// Whether the error is expected behavior (bad input, missing resource, rejected credentials),
    /// used to pick the log level.
    ///
    /// `true` should be logged at `warn`, `false` at `error`.
    /// **Update this method together with new variants.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::PermissionDenied { .. }
                | Self::QuotaExceeded { .. }
                | Self::ResourceNotFound { .. }
                | Self::MissingRequiredField { .. }
                | Self::XorViolation { .. }
                | Self::OrViolation { .. }
                | Self::InvalidParameter { .. }
                | Self::UnknownService { .. }
        )
    }

    /// HTTP status associated with the error, when there is one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ResourceNotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Service error code carried by the response body, when there is one.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::UnexpectedStatus { error_code, .. } => error_code.as_deref(),
            Self::Unknown { raw_code, .. } => raw_code.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for SdkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError { service, detail } => {
                write!(f, "[{service}] Network error: {detail}")
            }
            Self::Timeout { service, detail } => {
                write!(f, "[{service}] Request timeout: {detail}")
            }
            Self::RateLimited {
                service,
                retry_after,
                ..
            } => {
                if let Some(secs) = retry_after {
                    write!(f, "[{service}] Rate limited (retry after {secs}s)")
                } else {
                    write!(f, "[{service}] Rate limited")
                }
            }
            Self::InvalidCredentials {
                service,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{service}] Invalid credentials: {msg}")
                } else {
                    write!(f, "[{service}] Invalid credentials")
                }
            }
            Self::PermissionDenied {
                service,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{service}] Permission denied: {msg}")
                } else {
                    write!(f, "[{service}] Permission denied")
                }
            }
            Self::QuotaExceeded { service, .. } => {
                write!(f, "[{service}] Quota exceeded")
            }
            Self::ResourceNotFound {
                service,
                url,
                raw_message,
            } => {
                if let Some(msg) = raw_message {
                    write!(f, "[{service}] Resource not found at {url}: {msg}")
                } else {
                    write!(f, "[{service}] Resource not found at {url}")
                }
            }
            Self::UnexpectedStatus {
                service,
                method,
                url,
                status,
                expected,
                body,
                ..
            } => {
                write!(
                    f,
                    "[{service}] Expected HTTP response code {expected:?} when accessing [{method} {url}], but got {status} instead: {body}"
                )
            }
            Self::MissingRequiredField { field } => {
                write!(f, "Missing input for argument [{field}]")
            }
            Self::XorViolation { fields } => {
                write!(f, "Exactly one of {} must be provided", fields.join(" and "))
            }
            Self::OrViolation { fields } => {
                write!(f, "At least one of {} must be provided", fields.join(", "))
            }
            Self::InvalidParameter {
                service,
                param,
                detail,
            } => {
                write!(f, "[{service}] Invalid parameter '{param}': {detail}")
            }
            Self::UnknownService { service } => {
                write!(f, "Service type {service} is invalid or not supported")
            }
            Self::ParseError { service, detail } => {
                write!(f, "[{service}] Parse error: {detail}")
            }
            Self::SerializationError { service, detail } => {
                write!(f, "[{service}] Serialization error: {detail}")
            }
            Self::Unknown {
                service,
                raw_code,
                raw_message,
            } => match raw_code {
                Some(code) => write!(f, "[{service}] {code}: {raw_message}"),
                None => write!(f, "[{service}] {raw_message}"),
            },
        }
    }
}

impl std::error::Error for SdkError {}

/// Convenience type alias for `Result<T, SdkError>`.
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn unexpected(status: u16) -> SdkError {
        SdkError::UnexpectedStatus {
            service: "vpc".to_string(),
            method: "GET".to_string(),
            url: "https://vpc.cn-north-4.myhuaweicloud.com/v1/p/vpcs".to_string(),
            status,
            expected: vec![200],
            error_code: Some("VPC.0101".to_string()),
            body: "{}".to_string(),
        }
    }

    #[test]
    fn display_network_error() {
        let e = SdkError::NetworkError {
            service: "dns".to_string(),
            detail: "connection refused".to_string(),
        };
        assert_eq!(e.to_string(), "[dns] Network error: connection refused");
    }

    #[test]
    fn display_unexpected_status() {
        assert_eq!(
            unexpected(400).to_string(),
            "[vpc] Expected HTTP response code [200] when accessing [GET https://vpc.cn-north-4.myhuaweicloud.com/v1/p/vpcs], but got 400 instead: {}"
        );
    }

    #[test]
    fn display_missing_required_field() {
        let e = SdkError::MissingRequiredField {
            field: "cidr".to_string(),
        };
        assert_eq!(e.to_string(), "Missing input for argument [cidr]");
    }

    #[test]
    fn display_xor_violation() {
        let e = SdkError::XorViolation {
            fields: vec!["port_id".to_string(), "private_ip".to_string()],
        };
        assert_eq!(
            e.to_string(),
            "Exactly one of port_id and private_ip must be provided"
        );
    }

    #[test]
    fn display_unknown_with_code() {
        let e = SdkError::Unknown {
            service: "cbr".to_string(),
            raw_code: Some("BackupService.6302".to_string()),
            raw_message: "vault busy".to_string(),
        };
        assert_eq!(e.to_string(), "[cbr] BackupService.6302: vault busy");
    }

    #[test]
    fn not_found_covers_404_status() {
        assert!(unexpected(404).is_not_found());
        assert!(!unexpected(400).is_not_found());
        let e = SdkError::ResourceNotFound {
            service: "asm".to_string(),
            url: "u".to_string(),
            raw_message: None,
        };
        assert!(e.is_not_found());
        assert_eq!(e.status_code(), Some(404));
    }

    #[test]
    fn expected_classification() {
        assert!(
            SdkError::MissingRequiredField {
                field: "name".to_string()
            }
            .is_expected()
        );
        assert!(
            !SdkError::Timeout {
                service: "vpc".to_string(),
                detail: "x".to_string()
            }
            .is_expected()
        );
    }

    #[test]
    fn error_code_exposed() {
        assert_eq!(unexpected(400).error_code(), Some("VPC.0101"));
        assert_eq!(
            SdkError::MissingRequiredField {
                field: "a".to_string()
            }
            .error_code(),
            None
        );
    }

    #[test]
    fn serializes_with_code_tag() {
        let e = SdkError::OrViolation {
            fields: vec!["a".to_string(), "b".to_string()],
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["code"], "OrViolation");
    }
}
