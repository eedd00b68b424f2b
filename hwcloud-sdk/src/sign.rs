//! SDK-HMAC-SHA256 request signing
//!
//! Reference: <https://support.huaweicloud.com/devg-apisign/api-sign-algorithm-005.html>

use std::fmt::Write;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::utils::log_sanitizer::truncate_for_log;

/// Signing algorithm identifier, first token of the `Authorization` header.
pub const SIGN_ALGORITHM: &str = "SDK-HMAC-SHA256";

/// Timestamp header that is always part of the signed set.
pub const HEADER_SDK_DATE: &str = "X-Sdk-Date";

/// `chrono` format string of [`HEADER_SDK_DATE`].
pub const SDK_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `data` keyed by `key`.
pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, the error branch is unreachable in practice
    match HmacSha256::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        Err(_) => Vec::new(),
    }
}

/// AK/SK signer.
#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

impl Signer {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Build the `Authorization` header value for a request.
    ///
    /// `uri` is the URL path, `query` the raw query string without `?`.
    /// Every entry of `headers` is signed, so callers pass exactly the headers they send.
    pub fn sign(
        &self,
        method: &str,
        uri: &str,
        query: &str,
        headers: &[(String, String)],
        payload: &str,
        timestamp: &str,
    ) -> String {
        let canonical_uri = if uri.ends_with('/') {
            uri.to_string()
        } else {
            format!("{uri}/")
        };

        let canonical_query = if query.is_empty() {
            String::new()
        } else {
            let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
            params.sort_unstable();
            params.join("&")
        };

        let mut sorted_headers: Vec<(String, &str)> = headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.trim()))
            .collect();
        sorted_headers.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_headers = sorted_headers
            .iter()
            .fold(String::new(), |mut acc, (k, v)| {
                let _ = writeln!(acc, "{k}:{v}");
                acc
            });

        let signed_headers = sorted_headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let hashed_payload = hex::encode(Sha256::digest(payload.as_bytes()));

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{hashed_payload}"
        );
        log::debug!("CanonicalRequest:\n{}", truncate_for_log(&canonical_request));

        let hashed_canonical_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = format!("{SIGN_ALGORITHM}\n{timestamp}\n{hashed_canonical_request}");
        log::debug!("StringToSign:\n{string_to_sign}");

        let signature = hex::encode(hmac_sha256(
            self.secret_key.as_bytes(),
            string_to_sign.as_bytes(),
        ));

        format!(
            "{SIGN_ALGORITHM} Access={}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: &str = "20240101T000000Z";

    fn headers() -> Vec<(String, String)> {
        vec![
            ("Host".to_string(), "vpc.cn-north-4.myhuaweicloud.com".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            (HEADER_SDK_DATE.to_string(), TS.to_string()),
        ]
    }

    fn field<'a>(auth: &'a str, name: &str) -> Option<&'a str> {
        auth.split(&format!("{name}="))
            .nth(1)
            .map(|s| s.split(',').next().unwrap_or(s))
    }

    #[test]
    fn header_layout() {
        let auth = Signer::new("AK", "SK").sign("GET", "/v1/p/vpcs", "", &headers(), "", TS);
        assert!(auth.starts_with("SDK-HMAC-SHA256 Access=AK, SignedHeaders="));
        assert_eq!(
            field(&auth, "SignedHeaders"),
            Some("content-type;host;x-sdk-date")
        );
        let sig = field(&auth, "Signature").unwrap();
        assert_eq!(sig.len(), 64, "hex sha256 signature expected: {auth}");
    }

    #[test]
    fn deterministic() {
        let s = Signer::new("AK", "SK");
        let a = s.sign("POST", "/v1/p/subnets", "", &headers(), "{\"a\":1}", TS);
        let b = s.sign("POST", "/v1/p/subnets", "", &headers(), "{\"a\":1}", TS);
        assert_eq!(a, b);
    }

    #[test]
    fn trailing_slash_and_query_order_are_canonicalized() {
        let s = Signer::new("AK", "SK");
        let a = s.sign("GET", "/v2/zones", "b=2&a=1", &headers(), "", TS);
        let b = s.sign("GET", "/v2/zones/", "a=1&b=2", &headers(), "", TS);
        assert_eq!(field(&a, "Signature"), field(&b, "Signature"));
    }

    #[test]
    fn header_case_and_whitespace_ignored() {
        let s = Signer::new("AK", "SK");
        let spaced = vec![
            ("HOST".to_string(), "  vpc.cn-north-4.myhuaweicloud.com ".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
            ("x-sdk-date".to_string(), TS.to_string()),
        ];
        let a = s.sign("GET", "/v1/p/vpcs", "", &headers(), "", TS);
        let b = s.sign("GET", "/v1/p/vpcs", "", &spaced, "", TS);
        assert_eq!(a, b);
    }

    #[test]
    fn payload_method_and_secret_change_signature() {
        let base = Signer::new("AK", "SK").sign("PUT", "/v1/p/vpcs/1", "", &headers(), "{}", TS);
        let other_payload =
            Signer::new("AK", "SK").sign("PUT", "/v1/p/vpcs/1", "", &headers(), "{\"x\":1}", TS);
        let other_method =
            Signer::new("AK", "SK").sign("POST", "/v1/p/vpcs/1", "", &headers(), "{}", TS);
        let other_secret =
            Signer::new("AK", "SK2").sign("PUT", "/v1/p/vpcs/1", "", &headers(), "{}", TS);
        assert_ne!(field(&base, "Signature"), field(&other_payload, "Signature"));
        assert_ne!(field(&base, "Signature"), field(&other_method, "Signature"));
        assert_ne!(field(&base, "Signature"), field(&other_secret, "Signature"));
    }

    #[test]
    fn hmac_known_vector() {
        // RFC 4231 test case 2
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn debug_hides_secret() {
        let dbg = format!("{:?}", Signer::new("AK", "very-secret"));
        assert!(!dbg.contains("very-secret"));
    }
}
