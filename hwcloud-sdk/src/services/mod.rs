//! Typed request and response helpers per cloud service.
//!
//! Each module exposes path helpers, option structs implementing
//! [`RequestBody`](crate::request::RequestBody) and thin async functions over a
//! [`ServiceClient`](crate::ServiceClient). Responses stay as `serde_json::Value`
//! unless a typed shape is useful to callers.

pub mod apig;
pub mod asm;
pub mod cbr;
pub mod ces;
pub mod dds;
pub mod dns;
pub mod nat;
pub mod tags;
pub mod vpc;

use serde_json::Value;

use crate::error::{Result, SdkError};

/// Take `key` out of a response body, failing when it is missing.
pub(crate) fn take_member(service: &str, mut body: Value, key: &str) -> Result<Value> {
    match body.get_mut(key).map(Value::take) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(SdkError::ParseError {
            service: service.to_string(),
            detail: format!("response has no `{key}` member"),
        }),
    }
}
