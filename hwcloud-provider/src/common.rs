//! Helpers shared by resource handlers

use std::collections::BTreeMap;

use hwcloud_sdk::SdkError;
use hwcloud_sdk::services::tags::{ResourceTag, expand_tags, flatten_tags};
use serde_json::Value;

use crate::error::{ProviderError, ProviderResult};
use crate::resource_data::ResourceData;

/// Treat a not-found error as the resource having been deleted outside the provider.
///
/// Clears the ID and returns `Ok(())` so the caller drops the resource from state.
/// Any other error is returned with `message` as context.
pub fn check_deleted(d: &mut ResourceData, err: impl Into<ProviderError>, message: &str) -> ProviderResult<()> {
    let err = err.into();
    if err.is_not_found() {
        log::warn!("{message}: resource {} is gone, removing from state", d.id());
        d.set_id("");
        return Ok(());
    }
    Err(err.with_context(message))
}

/// Rewrite a 400/403 carrying one of `codes` into a not-found error.
///
/// Several services answer reads of deleted objects this way instead of with 404.
pub fn convert_expected_error_into_404(err: SdkError, codes: &[&str]) -> SdkError {
    let matches = matches!(err.status_code(), Some(400 | 403))
        && err.error_code().is_some_and(|c| codes.contains(&c));
    if !matches {
        return err;
    }
    match err {
        SdkError::UnexpectedStatus {
            service, url, body, ..
        } => SdkError::ResourceNotFound {
            service,
            url,
            raw_message: Some(body),
        },
        other => other,
    }
}

/// Tag map from the `tags` argument into the request list form.
pub fn expand_resource_tags(tags: &BTreeMap<String, String>) -> Vec<ResourceTag> {
    expand_tags(tags)
}

/// Tag list from a response body (`[{key, value}]`) into a map for state.
pub fn flatten_tag_list(raw: &Value) -> BTreeMap<String, String> {
    let tags: Vec<ResourceTag> = serde_json::from_value(raw.clone()).unwrap_or_default();
    flatten_tags(&tags)
}

/// Tag map as a JSON value for [`ResourceData::set`].
pub fn tags_value(tags: &BTreeMap<String, String>) -> Value {
    Value::Object(
        tags.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// String map from a JSON object; non-string values keep their JSON text.
pub fn string_map(raw: &Value) -> BTreeMap<String, String> {
    raw.as_object()
        .map(|o| {
            o.iter()
                .map(|(k, v)| (k.clone(), v.as_str().map_or_else(|| v.to_string(), ToString::to_string)))
                .collect()
        })
        .unwrap_or_default()
}

/// Names compare equal with or without a trailing dot (`example.com.`).
pub fn suppress_trailing_dot(_: &str, old: &Value, new: &Value) -> bool {
    match (old.as_str(), new.as_str()) {
        (Some(o), Some(n)) => o.trim_end_matches('.') == n.trim_end_matches('.'),
        _ => false,
    }
}

/// Split a composite `a/b` import ID.
pub fn split_id(id: &str, what: &str) -> ProviderResult<(String, String)> {
    match id.split_once('/') {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a.to_string(), b.to_string())),
        _ => Err(ProviderError::Validation(format!(
            "invalid ID format '{id}', want '{what}'"
        ))),
    }
}
