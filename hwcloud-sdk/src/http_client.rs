//! Shared HTTP executor
//!
//! Every `ServiceClient` call funnels through here: send, log, classify transport
//! failures, read the body. Status-code acceptance is decided by the caller, which
//! knows the per-request OK codes.
//!
//! Signing is not done here. A request is signed once before it reaches the executor,
//! and the same signed request is cloned for each retry attempt.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::error::SdkError;
use crate::utils::log_sanitizer::truncate_for_log;

/// Default number of retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Upper bound for a server-provided `Retry-After`.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Upper bound for exponential backoff.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text (may be empty).
    pub body: String,
}

/// HTTP helper functions.
pub struct HttpUtils;

impl HttpUtils {
    /// Send a request once and return its status and body.
    ///
    /// HTTP 429 becomes [`SdkError::RateLimited`] and 502/503/504 become
    /// [`SdkError::NetworkError`] so that the retry loop can pick them up.
    /// Any other status is returned as-is.
    pub async fn execute_request(
        request_builder: RequestBuilder,
        service: &str,
        method: &str,
        url: &str,
    ) -> Result<RawResponse, SdkError> {
        log::debug!("[{service}] {method} {url}");

        let response = request_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SdkError::Timeout {
                    service: service.to_string(),
                    detail: e.to_string(),
                }
            } else {
                SdkError::NetworkError {
                    service: service.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        log::debug!("[{service}] Response Status: {status}");

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if status == 429 {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{service}] Rate limited (HTTP 429), retry_after={retry_after:?}");
            return Err(SdkError::RateLimited {
                service: service.to_string(),
                retry_after,
                raw_message: Some(body),
            });
        }

        if matches!(status, 502..=504) {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{service}] Server error (HTTP {status})");
            return Err(SdkError::NetworkError {
                service: service.to_string(),
                detail: format!("HTTP {status}: {}", truncate_for_log(&body)),
            });
        }

        let body = response.text().await.map_err(|e| SdkError::NetworkError {
            service: service.to_string(),
            detail: format!("Failed to read response body: {e}"),
        })?;

        log::debug!("[{service}] Response Body: {}", truncate_for_log(&body));

        Ok(RawResponse { status, body })
    }

    /// Parse a JSON body into `T`.
    pub fn parse_json<T>(body: &str, service: &str) -> Result<T, SdkError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(body).map_err(|e| {
            log::error!("[{service}] JSON parse failed: {e}");
            log::error!("[{service}] Raw response: {}", truncate_for_log(body));
            SdkError::ParseError {
                service: service.to_string(),
                detail: e.to_string(),
            }
        })
    }

    /// Send a request, retrying transient failures up to `max_retries` times.
    ///
    /// # Retry strategy
    /// - Only network errors, timeouts and rate limiting are retried
    /// - Backoff: 100ms, 200ms, 400ms, ... capped at 10s
    /// - `Retry-After` wins over backoff, capped at 30s
    pub async fn execute_request_with_retry(
        request_builder: RequestBuilder,
        service: &str,
        method: &str,
        url: &str,
        max_retries: u32,
    ) -> Result<RawResponse, SdkError> {
        if max_retries == 0 {
            return Self::execute_request(request_builder, service, method, url).await;
        }

        let mut last_error = None;

        for attempt in 0..=max_retries {
            let Some(req) = request_builder.try_clone() else {
                log::warn!("[{service}] Cannot clone request, disabling retry");
                return Self::execute_request(request_builder, service, method, url).await;
            };

            match Self::execute_request(req, service, method, url).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < max_retries && is_retryable(&e) => {
                    let delay = retry_delay(&e, attempt);
                    log::warn!(
                        "[{}] Request failed (attempt {}/{}), retrying in {:.1}s: {}",
                        service,
                        attempt + 1,
                        max_retries,
                        delay.as_secs_f32(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| SdkError::NetworkError {
            service: service.to_string(),
            detail: "All retries exhausted with no error captured".to_string(),
        }))
    }
}

/// Transient failures worth another attempt.
pub(crate) fn is_retryable(error: &SdkError) -> bool {
    matches!(
        error,
        SdkError::NetworkError { .. } | SdkError::Timeout { .. } | SdkError::RateLimited { .. }
    )
}

fn retry_delay(error: &SdkError, attempt: u32) -> Duration {
    if let SdkError::RateLimited {
        retry_after: Some(secs),
        ..
    } = error
    {
        Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS))
    } else {
        backoff_delay(attempt)
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let capped_attempt = attempt.min(20);
    let delay_ms = 100_u64.saturating_mul(1_u64 << capped_attempt);
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_transient_errors() {
        let network = SdkError::NetworkError {
            service: "vpc".into(),
            detail: "reset".into(),
        };
        let timeout = SdkError::Timeout {
            service: "vpc".into(),
            detail: "slow".into(),
        };
        let limited = SdkError::RateLimited {
            service: "vpc".into(),
            retry_after: None,
            raw_message: None,
        };
        assert!(is_retryable(&network));
        assert!(is_retryable(&timeout));
        assert!(is_retryable(&limited));
    }

    #[test]
    fn business_errors_not_retried() {
        let not_found = SdkError::ResourceNotFound {
            service: "dns".into(),
            url: "u".into(),
            raw_message: None,
        };
        let missing = SdkError::MissingRequiredField {
            field: "name".into(),
        };
        let denied = SdkError::InvalidCredentials {
            service: "iam".into(),
            raw_message: None,
        };
        assert!(!is_retryable(&not_found));
        assert!(!is_retryable(&missing));
        assert!(!is_retryable(&denied));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(800));
        assert_eq!(backoff_delay(7), Duration::from_millis(10_000));
        assert_eq!(backoff_delay(40), Duration::from_millis(10_000));
    }

    #[test]
    fn retry_after_is_honoured_and_capped() {
        let short = SdkError::RateLimited {
            service: "ces".into(),
            retry_after: Some(3),
            raw_message: None,
        };
        let long = SdkError::RateLimited {
            service: "ces".into(),
            retry_after: Some(600),
            raw_message: None,
        };
        assert_eq!(retry_delay(&short, 4), Duration::from_secs(3));
        assert_eq!(retry_delay(&long, 0), Duration::from_secs(30));
    }

    #[test]
    fn parse_json_invalid_is_parse_error() {
        let result: Result<serde_json::Value, SdkError> = HttpUtils::parse_json("{oops", "dds");
        assert!(
            matches!(&result, Err(SdkError::ParseError { service, .. }) if service == "dds"),
            "unexpected parse result: {result:?}"
        );
    }
}
