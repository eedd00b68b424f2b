//! Client-side filtering for data sources
//!
//! List APIs filter on a few fields at most. Data sources fetch everything and narrow
//! the result here. A filter whose value is unset (zero) matches every item.

use std::collections::BTreeMap;

use hwcloud_sdk::extract::path_search;
use hwcloud_sdk::request::is_zero;
use serde_json::Value;

fn field_matches(item: &Value, path: &str, want: &Value) -> bool {
    let Some(got) = path_search(path, item) else {
        return false;
    };
    match (&got, want) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(a), Value::String(b)) => a.to_string() == *b,
        _ => got == *want,
    }
}

/// Keep items whose value at every `path` equals the filter value.
pub fn filter_by_fields(items: Vec<Value>, filters: &[(&str, Value)]) -> Vec<Value> {
    let active: Vec<&(&str, Value)> = filters.iter().filter(|(_, v)| !is_zero(v)).collect();
    if active.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| active.iter().all(|(path, want)| field_matches(item, path, want)))
        .collect()
}

/// Keep items carrying every tag in `tags`. `tags_path` points at a `[{key, value}]` list.
pub fn filter_by_tags(items: Vec<Value>, tags_path: &str, tags: &BTreeMap<String, String>) -> Vec<Value> {
    if tags.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            let have = path_search(tags_path, item).unwrap_or(Value::Null);
            let have = crate::common::flatten_tag_list(&have);
            tags.iter().all(|(k, v)| have.get(k) == Some(v))
        })
        .collect()
}
