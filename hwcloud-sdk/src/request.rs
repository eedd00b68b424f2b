//! Request body and query string construction
//!
//! Option structs derive `Serialize` (with `skip_serializing_if` for optional fields)
//! and implement [`RequestBody`] to declare field rules. The builders serialize the
//! options, check the rules against the serialized form and strip nulls.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, SdkError};

/// A constraint on serialized option fields. Names are serialized keys; a dotted
/// name (`billing.size`) addresses a nested object member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// The field must be present and non-zero.
    Required(&'static str),
    /// Exactly one of the two fields must be set.
    Xor(&'static str, &'static str),
    /// At least one of the fields must be set.
    Or(&'static [&'static str]),
}

/// Options that can be turned into a request body or query string.
pub trait RequestBody: Serialize {
    /// Field rules checked before the request is built.
    fn rules() -> &'static [FieldRule] {
        &[]
    }
}

impl RequestBody for Value {}

/// Zero value check: absent, `null`, `""`, `0`, `false`, `[]` and `{}` all count as unset.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn lookup<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    let mut parts = name.split('.');
    let mut current = object.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_set(object: &Map<String, Value>, name: &str) -> bool {
    lookup(object, name).is_some_and(|v| !is_zero(v))
}

fn check_rules(object: &Map<String, Value>, rules: &[FieldRule]) -> Result<()> {
    for rule in rules {
        match *rule {
            FieldRule::Required(field) => {
                if !is_set(object, field) {
                    return Err(SdkError::MissingRequiredField {
                        field: field.to_string(),
                    });
                }
            }
            FieldRule::Xor(a, b) => {
                if is_set(object, a) == is_set(object, b) {
                    return Err(SdkError::XorViolation {
                        fields: vec![a.to_string(), b.to_string()],
                    });
                }
            }
            FieldRule::Or(fields) => {
                if !fields.iter().any(|f| is_set(object, f)) {
                    return Err(SdkError::OrViolation {
                        fields: fields.iter().map(ToString::to_string).collect(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn to_object<T: RequestBody>(opts: &T) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(opts).map_err(|e| SdkError::SerializationError {
        service: "request".to_string(),
        detail: e.to_string(),
    })?;
    match value {
        Value::Object(object) => Ok(object),
        other => Err(SdkError::SerializationError {
            service: "request".to_string(),
            detail: format!("options must serialize to an object, got {other}"),
        }),
    }
}

/// Serialize `opts`, enforce its field rules, strip nulls and optionally wrap the
/// result as `{parent: body}`.
pub fn build_request_body<T: RequestBody>(opts: &T, parent: Option<&str>) -> Result<Value> {
    let object = to_object(opts)?;
    check_rules(&object, T::rules())?;

    let body = remove_nil(Value::Object(object));
    Ok(match parent {
        Some(key) if !key.is_empty() => {
            let mut wrapped = Map::new();
            wrapped.insert(key.to_string(), body);
            Value::Object(wrapped)
        }
        _ => body,
    })
}

/// Serialize `opts` into `?k=v&k2=v2` with sorted keys, or `""` when nothing is set.
///
/// Arrays repeat the key, nulls and empty strings are skipped, zero numbers and
/// `false` are kept. Nested objects are sent as compact JSON.
pub fn build_query_string<T: RequestBody>(opts: &T) -> Result<String> {
    let object = to_object(opts)?;
    check_rules(&object, T::rules())?;

    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();

    let mut pairs = Vec::new();
    for key in keys {
        let encoded_key = urlencoding::encode(key);
        match &object[key.as_str()] {
            Value::Array(items) => {
                for item in items {
                    if let Some(v) = query_scalar(item) {
                        pairs.push(format!("{encoded_key}={}", urlencoding::encode(&v)));
                    }
                }
            }
            value => {
                if let Some(v) = query_scalar(value) {
                    pairs.push(format!("{encoded_key}={}", urlencoding::encode(&v)));
                }
            }
        }
    }

    if pairs.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!("?{}", pairs.join("&")))
    }
}

fn query_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Drop null object members recursively. Array elements that end up as empty
/// objects are removed.
pub fn remove_nil(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, remove_nil(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(remove_nil)
                .filter(|v| !matches!(v, Value::Object(o) if o.is_empty()))
                .collect(),
        ),
        other => other,
    }
}

/// Map zero values to `null` so that a later [`remove_nil`] drops them.
pub fn value_ignore_empty(value: Value) -> Value {
    if is_zero(&value) {
        Value::Null
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize, Default)]
    struct SubnetOpts {
        name: String,
        cidr: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        dhcp_enable: Option<bool>,
    }

    impl RequestBody for SubnetOpts {
        fn rules() -> &'static [FieldRule] {
            &[FieldRule::Required("name"), FieldRule::Required("cidr")]
        }
    }

    #[derive(Serialize, Default)]
    struct EipOpts {
        #[serde(skip_serializing_if = "Option::is_none")]
        port_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        private_ip: Option<String>,
    }

    impl RequestBody for EipOpts {
        fn rules() -> &'static [FieldRule] {
            &[FieldRule::Xor("port_id", "private_ip")]
        }
    }

    #[derive(Serialize, Default)]
    struct ListOpts {
        #[serde(skip_serializing_if = "Option::is_none")]
        marker: Option<String>,
        limit: u32,
        name: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        status: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        enterprise_project_id: Option<String>,
    }

    impl RequestBody for ListOpts {}

    #[derive(Serialize)]
    struct FilterOpts {
        name: Option<String>,
        id: Option<String>,
    }

    impl RequestBody for FilterOpts {
        fn rules() -> &'static [FieldRule] {
            &[FieldRule::Or(&["name", "id"])]
        }
    }

    #[test]
    fn body_wrapped_in_parent() {
        let opts = SubnetOpts {
            name: "subnet-1".into(),
            cidr: "192.168.0.0/24".into(),
            dhcp_enable: Some(true),
            ..Default::default()
        };
        let body = build_request_body(&opts, Some("subnet")).unwrap();
        assert_eq!(
            body,
            json!({"subnet": {"name": "subnet-1", "cidr": "192.168.0.0/24", "dhcp_enable": true}})
        );
    }

    #[test]
    fn empty_parent_means_unwrapped() {
        let opts = SubnetOpts {
            name: "a".into(),
            cidr: "10.0.0.0/8".into(),
            ..Default::default()
        };
        let body = build_request_body(&opts, Some("")).unwrap();
        assert_eq!(body["name"], "a");
    }

    #[test]
    fn required_empty_string_rejected() {
        let opts = SubnetOpts {
            name: "a".into(),
            ..Default::default()
        };
        let err = build_request_body(&opts, None);
        assert!(matches!(err, Err(SdkError::MissingRequiredField { field }) if field == "cidr"));
    }

    #[test]
    fn xor_requires_exactly_one() {
        let neither = build_request_body(&EipOpts::default(), None);
        assert!(matches!(neither, Err(SdkError::XorViolation { .. })));

        let both = build_request_body(
            &EipOpts {
                port_id: Some("p".into()),
                private_ip: Some("10.0.0.1".into()),
            },
            None,
        );
        assert!(matches!(both, Err(SdkError::XorViolation { .. })));

        let one = build_request_body(
            &EipOpts {
                port_id: Some("p".into()),
                private_ip: None,
            },
            None,
        );
        assert!(one.is_ok());
    }

    #[test]
    fn or_requires_any() {
        let none = build_request_body(
            &FilterOpts {
                name: None,
                id: Some(String::new()),
            },
            None,
        );
        assert!(matches!(none, Err(SdkError::OrViolation { fields }) if fields == ["name", "id"]));

        let some = build_request_body(
            &FilterOpts {
                name: Some("x".into()),
                id: None,
            },
            None,
        )
        .unwrap();
        // explicit None serializes as null and is stripped
        assert_eq!(some, json!({"name": "x"}));
    }

    #[test]
    fn nested_required_path() {
        #[derive(Serialize)]
        struct VaultOpts {
            billing: Value,
        }
        impl RequestBody for VaultOpts {
            fn rules() -> &'static [FieldRule] {
                &[FieldRule::Required("billing.size")]
            }
        }
        let missing = build_request_body(&VaultOpts { billing: json!({"size": 0}) }, None);
        assert!(matches!(missing, Err(SdkError::MissingRequiredField { field }) if field == "billing.size"));
        let ok = build_request_body(&VaultOpts { billing: json!({"size": 100}) }, None);
        assert!(ok.is_ok());
    }

    #[test]
    fn non_object_options_rejected() {
        let err = build_request_body(&json!([1, 2]), None);
        assert!(matches!(err, Err(SdkError::SerializationError { .. })));
    }

    #[test]
    fn query_sorted_encoded_and_repeated() {
        let opts = ListOpts {
            marker: Some("a b".into()),
            limit: 0,
            name: String::new(),
            status: vec!["ACTIVE".into(), "UNKNOWN".into()],
            enterprise_project_id: None,
        };
        assert_eq!(
            build_query_string(&opts).unwrap(),
            "?limit=0&marker=a%20b&status=ACTIVE&status=UNKNOWN"
        );
    }

    #[test]
    fn query_empty_when_nothing_set() {
        let q = build_query_string(&json!({"name": "", "id": null})).unwrap();
        assert_eq!(q, "");
    }

    #[test]
    fn remove_nil_recurses_and_prunes_empty_elements() {
        let input = json!({
            "a": null,
            "b": {"c": null, "d": 1},
            "tags": [{"key": null}, {"key": "k", "value": null}],
            "list": [null, 2]
        });
        assert_eq!(
            remove_nil(input),
            json!({"b": {"d": 1}, "tags": [{"key": "k"}], "list": [null, 2]})
        );
    }

    #[test]
    fn ignore_empty_maps_zero_to_null() {
        assert_eq!(value_ignore_empty(json!("")), Value::Null);
        assert_eq!(value_ignore_empty(json!(0)), Value::Null);
        assert_eq!(value_ignore_empty(json!(false)), Value::Null);
        assert_eq!(value_ignore_empty(json!([])), Value::Null);
        assert_eq!(value_ignore_empty(json!({})), Value::Null);
        assert_eq!(value_ignore_empty(json!("x")), json!("x"));
        assert_eq!(value_ignore_empty(json!(0.5)), json!(0.5));
    }
}
