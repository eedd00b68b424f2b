//! Resource schema model
//!
//! A [`SchemaMap`] declares the arguments and attributes of a resource or data source.
//! [`prepare_config`] checks a raw JSON configuration against it (unknown keys, required
//! arguments, types, validators, item counts) and fills in defaults. [`diff`] compares
//! prior state with a prepared configuration, honouring computed attributes, sets and
//! suppress functions.

use std::collections::BTreeMap;
use std::net::IpAddr;

use hwcloud_sdk::request::is_zero;
use regex::Regex;
use serde_json::{Map, Value};

pub type SchemaMap = BTreeMap<&'static str, Schema>;

/// Returns `true` when the difference between `old` and `new` should be ignored.
pub type DiffSuppressFn = fn(key: &str, old: &Value, new: &Value) -> bool;

static NULL: Value = Value::Null;

#[derive(Debug, Clone)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    /// String to string map.
    Map,
    List(Box<Schema>),
    /// Nested object; only used as a list element.
    Block(SchemaMap),
}

#[derive(Debug, Clone)]
pub enum Validator {
    StringInSlice(&'static [&'static str]),
    IntBetween(i64, i64),
    StringLenBetween(usize, usize),
    /// Regex pattern and the message reported when it does not match.
    StringMatch(&'static str, &'static str),
    /// IPv4 or IPv6 address.
    IpAddress,
    /// Network in `address/prefix` form.
    Cidr,
}

fn is_cidr(s: &str) -> bool {
    let Some((addr, prefix)) = s.split_once('/') else {
        return false;
    };
    let max = match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => 32,
        Ok(IpAddr::V6(_)) => 128,
        Err(_) => return false,
    };
    prefix.parse::<u8>().is_ok_and(|p| p <= max)
}

impl Validator {
    fn check(&self, path: &str, value: &Value) -> Result<(), String> {
        match self {
            Self::StringInSlice(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => Ok(()),
                _ => Err(format!("{path}: expected one of {allowed:?}, got {value}")),
            },
            Self::IntBetween(min, max) => match value.as_i64() {
                Some(n) if (*min..=*max).contains(&n) => Ok(()),
                _ => Err(format!("{path}: expected to be in the range ({min} - {max}), got {value}")),
            },
            Self::StringLenBetween(min, max) => {
                let len = value.as_str().map_or(0, |s| s.chars().count());
                if (*min..=*max).contains(&len) {
                    Ok(())
                } else {
                    Err(format!("{path}: expected length in the range ({min} - {max}), got {len}"))
                }
            }
            Self::StringMatch(pattern, message) => {
                let re = Regex::new(pattern).map_err(|e| format!("{path}: {e}"))?;
                match value.as_str() {
                    Some(s) if re.is_match(s) => Ok(()),
                    _ => Err(format!("{path}: {message}")),
                }
            }
            Self::IpAddress => match value.as_str() {
                Some(s) if s.parse::<IpAddr>().is_ok() => Ok(()),
                _ => Err(format!("{path}: expected a valid IP address, got {value}")),
            },
            Self::Cidr => match value.as_str() {
                Some(s) if is_cidr(s) => Ok(()),
                _ => Err(format!("{path}: expected a valid CIDR block, got {value}")),
            },
        }
    }
}

/// One argument or attribute.
#[derive(Debug, Clone)]
pub struct Schema {
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    /// List compared without regard to order.
    pub is_set: bool,
    pub default: Option<Value>,
    pub min_items: usize,
    pub max_items: Option<usize>,
    pub validators: Vec<Validator>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub description: &'static str,
}

impl Schema {
    fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            is_set: false,
            default: None,
            min_items: 0,
            max_items: None,
            validators: Vec::new(),
            diff_suppress: None,
            description: "",
        }
    }

    pub fn string() -> Self {
        Self::new(ValueType::String)
    }

    pub fn int() -> Self {
        Self::new(ValueType::Int)
    }

    pub fn float() -> Self {
        Self::new(ValueType::Float)
    }

    pub fn bool() -> Self {
        Self::new(ValueType::Bool)
    }

    pub fn map() -> Self {
        Self::new(ValueType::Map)
    }

    pub fn list(elem: Schema) -> Self {
        Self::new(ValueType::List(Box::new(elem)))
    }

    /// Unordered list.
    pub fn set(elem: Schema) -> Self {
        let mut s = Self::list(elem);
        s.is_set = true;
        s
    }

    /// List of nested blocks.
    pub fn block_list(fields: SchemaMap) -> Self {
        Self::list(Self::new(ValueType::Block(fields)))
    }

    /// Unordered list of nested blocks.
    pub fn block_set(fields: SchemaMap) -> Self {
        Self::set(Self::new(ValueType::Block(fields)))
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    #[must_use]
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = n;
        self
    }

    #[must_use]
    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    #[must_use]
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    #[must_use]
    pub fn diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }

    #[must_use]
    pub fn description(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }

    /// Whether the user may set this in configuration.
    pub fn is_configurable(&self) -> bool {
        self.required || self.optional
    }

    /// Nested fields when this is a list of blocks.
    pub fn block_fields(&self) -> Option<&SchemaMap> {
        match &self.value_type {
            ValueType::List(elem) => match &elem.value_type {
                ValueType::Block(fields) => Some(fields),
                _ => None,
            },
            ValueType::Block(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Shared `region` argument.
pub fn region_schema() -> Schema {
    Schema::string()
        .optional()
        .computed()
        .force_new()
        .description("The region in which to create the resource.")
}

/// `enable_force_new` argument of resources with non-updatable parameters.
pub fn enable_force_new_schema() -> Schema {
    Schema::string()
        .optional()
        .validate(Validator::StringInSlice(&["true", "false"]))
        .description("Whether to replace the resource when a non-updatable parameter changes.")
}

/// Check `raw` against `schema`, coerce values to their declared types and fill defaults.
///
/// Returns every problem found, each prefixed with its attribute path.
pub fn prepare_config(schema: &SchemaMap, raw: &Map<String, Value>) -> Result<Map<String, Value>, Vec<String>> {
    let mut errors = Vec::new();
    let out = prepare_object("", schema, raw, &mut errors);
    if errors.is_empty() { Ok(out) } else { Err(errors) }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn prepare_object(
    prefix: &str,
    schema: &SchemaMap,
    raw: &Map<String, Value>,
    errors: &mut Vec<String>,
) -> Map<String, Value> {
    for key in raw.keys() {
        if !schema.contains_key(key.as_str()) {
            errors.push(format!("{}: unsupported argument", join_path(prefix, key)));
        }
    }

    let mut out = Map::new();
    for (key, s) in schema {
        let path = join_path(prefix, key);
        let value = raw.get(*key).cloned().unwrap_or(Value::Null);
        let prepared = prepare_value(&path, s, value, errors);
        if !prepared.is_null() {
            out.insert((*key).to_string(), prepared);
        }
    }
    out
}

fn prepare_value(path: &str, s: &Schema, value: Value, errors: &mut Vec<String>) -> Value {
    if value.is_null() {
        if let Some(default) = &s.default {
            return default.clone();
        }
        if s.required {
            errors.push(format!("{path}: required argument is missing"));
        }
        return Value::Null;
    }
    if !s.is_configurable() {
        errors.push(format!("{path}: cannot set a value for a computed attribute"));
        return Value::Null;
    }
    prepare_element(path, s, value, errors)
}

/// Coerce and validate a value without presence checks (list elements).
fn prepare_element(path: &str, s: &Schema, value: Value, errors: &mut Vec<String>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let Some(coerced) = coerce(path, s, value, errors) else {
        return Value::Null;
    };
    for validator in &s.validators {
        if let Err(e) = validator.check(path, &coerced) {
            errors.push(e);
        }
    }
    coerced
}

fn coerce(path: &str, s: &Schema, value: Value, errors: &mut Vec<String>) -> Option<Value> {
    let mismatch = |errors: &mut Vec<String>, want: &str, got: &Value| {
        errors.push(format!("{path}: expected {want}, got {got}"));
        None
    };

    match (&s.value_type, value) {
        (ValueType::String, Value::String(v)) => Some(Value::String(v)),
        (ValueType::String, v @ (Value::Number(_) | Value::Bool(_))) => Some(Value::String(v.to_string())),
        (ValueType::Int, Value::Number(n)) if n.is_i64() => Some(Value::Number(n)),
        (ValueType::Int, Value::String(v)) => match v.trim().parse::<i64>() {
            Ok(n) => Some(Value::from(n)),
            Err(_) => mismatch(errors, "an integer", &Value::String(v)),
        },
        (ValueType::Float, Value::Number(n)) => Some(Value::Number(n)),
        (ValueType::Float, Value::String(v)) => match v.trim().parse::<f64>() {
            Ok(f) => Some(Value::from(f)),
            Err(_) => mismatch(errors, "a number", &Value::String(v)),
        },
        (ValueType::Bool, Value::Bool(b)) => Some(Value::Bool(b)),
        (ValueType::Bool, Value::String(v)) => match v.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => mismatch(errors, "a boolean", &Value::String(v)),
        },
        (ValueType::Map, Value::Object(object)) => Some(Value::Object(
            object
                .into_iter()
                .map(|(k, v)| match v {
                    Value::String(s) => (k, Value::String(s)),
                    other => (k, Value::String(other.to_string())),
                })
                .collect(),
        )),
        (ValueType::List(elem), value) => {
            // A single block may be written without the surrounding list.
            let items = match value {
                Value::Array(items) => items,
                obj @ Value::Object(_) if matches!(elem.value_type, ValueType::Block(_)) => vec![obj],
                other => return mismatch(errors, "a list", &other),
            };
            if items.len() < s.min_items {
                errors.push(format!("{path}: attribute supports {} item minimum, config has {}", s.min_items, items.len()));
            }
            if let Some(max) = s.max_items
                && items.len() > max
            {
                errors.push(format!("{path}: attribute supports {max} item maximum, config has {}", items.len()));
            }
            Some(Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| prepare_element(&format!("{path}.{i}"), elem, item, errors))
                    .collect(),
            ))
        }
        (ValueType::Block(fields), Value::Object(object)) => {
            Some(Value::Object(prepare_object(path, fields, &object, errors)))
        }
        (ValueType::String, v) => mismatch(errors, "a string", &v),
        (ValueType::Int, v) => mismatch(errors, "an integer", &v),
        (ValueType::Float, v) => mismatch(errors, "a number", &v),
        (ValueType::Bool, v) => mismatch(errors, "a boolean", &v),
        (ValueType::Map, v) => mismatch(errors, "a map", &v),
        (ValueType::Block(_), v) => mismatch(errors, "a block", &v),
    }
}

/// A planned change to one top-level attribute.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AttributeChange {
    pub key: String,
    pub old: Value,
    pub new: Value,
    pub force_new: bool,
    #[serde(skip)]
    pub sensitive: bool,
}

/// Configurable attributes whose planned value differs from prior state.
///
/// A null planned value for a computed attribute keeps the prior value and is not a change.
pub fn diff(schema: &SchemaMap, prior: &Map<String, Value>, planned: &Map<String, Value>) -> Vec<AttributeChange> {
    schema
        .iter()
        .filter(|(_, s)| s.is_configurable())
        .filter_map(|(key, s)| {
            let old = prior.get(*key).unwrap_or(&NULL);
            let new = planned.get(*key).unwrap_or(&NULL);
            if new.is_null() && s.computed {
                return None;
            }
            if values_equal(key, s, old, new) {
                return None;
            }
            Some(AttributeChange {
                key: (*key).to_string(),
                old: old.clone(),
                new: new.clone(),
                force_new: s.force_new,
                sensitive: s.sensitive,
            })
        })
        .collect()
}

/// Compare two values of attribute `key` under `s`. Null equals the zero value.
pub fn values_equal(key: &str, s: &Schema, old: &Value, new: &Value) -> bool {
    if let Some(suppress) = s.diff_suppress
        && suppress(key, old, new)
    {
        return true;
    }

    match &s.value_type {
        ValueType::List(elem) => {
            let empty = Vec::new();
            let o = old.as_array().unwrap_or(&empty);
            let n = new.as_array().unwrap_or(&empty);
            if o.len() != n.len() {
                return false;
            }
            if s.is_set {
                n.iter().all(|nv| o.iter().any(|ov| values_equal(key, elem, ov, nv)))
                    && o.iter().all(|ov| n.iter().any(|nv| values_equal(key, elem, ov, nv)))
            } else {
                o.iter().zip(n).all(|(ov, nv)| values_equal(key, elem, ov, nv))
            }
        }
        ValueType::Block(fields) => {
            let empty = Map::new();
            let o = old.as_object().unwrap_or(&empty);
            let n = new.as_object().unwrap_or(&empty);
            fields.iter().filter(|(_, fs)| fs.is_configurable()).all(|(k, fs)| {
                let nv = n.get(*k).unwrap_or(&NULL);
                (nv.is_null() && fs.computed) || values_equal(k, fs, o.get(*k).unwrap_or(&NULL), nv)
            })
        }
        ValueType::Map => {
            let empty = Map::new();
            old.as_object().unwrap_or(&empty) == new.as_object().unwrap_or(&empty)
        }
        _ => scalar_equal(old, new),
    }
}

fn scalar_equal(old: &Value, new: &Value) -> bool {
    if is_zero(old) && is_zero(new) {
        return true;
    }
    match (old, new) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => old == new,
    }
}

/// Copy prior values of computed attributes the planned configuration leaves unset.
pub fn merge_computed(schema: &SchemaMap, prior: &Map<String, Value>, planned: &Map<String, Value>) -> Map<String, Value> {
    let mut out = planned.clone();
    for (key, s) in schema {
        if !s.computed || planned.get(*key).is_some_and(|v| !v.is_null()) {
            continue;
        }
        if let Some(v) = prior.get(*key) {
            out.insert((*key).to_string(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn suppress_trailing_dot(_: &str, old: &Value, new: &Value) -> bool {
        let trim = |v: &Value| v.as_str().unwrap_or("").trim_end_matches('.').to_string();
        trim(old) == trim(new)
    }

    fn schema() -> SchemaMap {
        BTreeMap::from([
            ("region", region_schema()),
            ("name", Schema::string().required().diff_suppress(suppress_trailing_dot)),
            ("type", Schema::string().required().force_new().validate(Validator::StringInSlice(&["A", "AAAA", "CNAME"]))),
            ("ttl", Schema::int().optional().default_value(300).validate(Validator::IntBetween(1, 2_147_483_647))),
            ("records", Schema::set(Schema::string()).required().min_items(1)),
            ("enabled", Schema::bool().optional()),
            ("tags", Schema::map().optional()),
            ("description", Schema::string().optional().validate(Validator::StringLenBetween(0, 10))),
            ("email", Schema::string().optional().validate(Validator::StringMatch("^[^@]+@[^@]+$", "invalid email"))),
            (
                "router",
                Schema::block_list(BTreeMap::from([
                    ("router_id", Schema::string().required()),
                    ("router_region", Schema::string().optional().computed()),
                ]))
                .optional()
                .max_items(1),
            ),
            ("status", Schema::string().computed()),
        ])
    }

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults_and_coercion() {
        let out = prepare_config(
            &schema(),
            &config(json!({"name": "www", "type": "A", "records": ["1.1.1.1"], "enabled": "true", "tags": {"n": 1}})),
        )
        .unwrap();
        assert_eq!(out["ttl"], 300);
        assert_eq!(out["enabled"], true);
        assert_eq!(out["tags"], json!({"n": "1"}));
        assert!(!out.contains_key("region"));
    }

    #[test]
    fn collects_all_errors() {
        let errors = prepare_config(
            &schema(),
            &config(json!({
                "type": "MX",
                "ttl": 0,
                "records": [],
                "status": "ACTIVE",
                "bogus": 1,
                "description": "far too long text",
                "email": "nope",
                "router": [{"router_id": "a"}, {"router_id": "b"}]
            })),
        )
        .err()
        .unwrap();
        let joined = errors.join("\n");
        assert!(joined.contains("bogus: unsupported argument"));
        assert!(joined.contains("name: required argument is missing"));
        assert!(joined.contains("type: expected one of"));
        assert!(joined.contains("ttl: expected to be in the range"));
        assert!(joined.contains("records: attribute supports 1 item minimum"));
        assert!(joined.contains("status: cannot set a value for a computed attribute"));
        assert!(joined.contains("description: expected length"));
        assert!(joined.contains("email: invalid email"));
        assert!(joined.contains("router: attribute supports 1 item maximum"));
    }

    #[test]
    fn nested_block_checked() {
        let errors = prepare_config(
            &schema(),
            &config(json!({"name": "a", "type": "A", "records": ["x"], "router": {"router_region": "r"}})),
        )
        .err()
        .unwrap();
        assert_eq!(errors, vec!["router.0.router_id: required argument is missing".to_string()]);
    }

    #[test]
    fn type_mismatch_reported() {
        let errors = prepare_config(&schema(), &config(json!({"name": "a", "type": "A", "records": "x", "ttl": "abc"})))
            .err()
            .unwrap();
        assert!(errors.iter().any(|e| e == "records: expected a list, got \"x\""));
        assert!(errors.iter().any(|e| e.starts_with("ttl: expected an integer")));
    }

    #[test]
    fn diff_honours_suppress_sets_and_computed() {
        let s = schema();
        let prior = config(json!({
            "name": "www.example.com.",
            "type": "A",
            "ttl": 300,
            "records": ["1.1.1.1", "2.2.2.2"],
            "router": [{"router_id": "vpc-1", "router_region": "cn-north-4"}],
            "region": "cn-north-4",
            "status": "ACTIVE",
            "description": ""
        }));
        let planned = config(json!({
            "name": "www.example.com",
            "type": "A",
            "ttl": 300,
            "records": ["2.2.2.2", "1.1.1.1"],
            "router": [{"router_id": "vpc-1"}]
        }));
        assert!(diff(&s, &prior, &planned).is_empty());
    }

    #[test]
    fn diff_flags_force_new() {
        let s = schema();
        let prior = config(json!({"name": "a", "type": "A", "ttl": 300, "records": ["1.1.1.1"]}));
        let planned = config(json!({"name": "a", "type": "CNAME", "ttl": 600, "records": ["1.1.1.1"]}));
        let changes = diff(&s, &prior, &planned);
        let keys: Vec<_> = changes.iter().map(|c| (c.key.as_str(), c.force_new)).collect();
        assert_eq!(keys, vec![("ttl", false), ("type", true)]);
    }

    #[test]
    fn removed_optional_is_a_change() {
        let s = schema();
        let prior = config(json!({"name": "a", "type": "A", "records": ["x"], "tags": {"k": "v"}}));
        let planned = config(json!({"name": "a", "type": "A", "records": ["x"]}));
        let changes = diff(&s, &prior, &planned);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "tags");
        assert_eq!(changes[0].new, Value::Null);
    }

    #[test]
    fn merge_computed_keeps_prior_values() {
        let prior = config(json!({"status": "ACTIVE", "region": "cn-north-4", "name": "old"}));
        let planned = config(json!({"name": "new"}));
        let merged = merge_computed(&schema(), &prior, &planned);
        assert_eq!(merged["status"], "ACTIVE");
        assert_eq!(merged["region"], "cn-north-4");
        assert_eq!(merged["name"], "new");
    }

    #[test]
    fn network_validators() {
        let ok = |v: &Validator, s: &str| v.check("x", &json!(s)).is_ok();
        assert!(ok(&Validator::IpAddress, "192.168.0.1"));
        assert!(ok(&Validator::IpAddress, "fe80::1"));
        assert!(!ok(&Validator::IpAddress, "192.168.0.256"));
        assert!(ok(&Validator::Cidr, "10.0.0.0/8"));
        assert!(ok(&Validator::Cidr, "2001:db8::/32"));
        assert!(!ok(&Validator::Cidr, "10.0.0.0/33"));
        assert!(!ok(&Validator::Cidr, "10.0.0.0"));
    }
}
