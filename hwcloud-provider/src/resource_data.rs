//! Per-operation view of one resource's configuration and state

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{ProviderError, ProviderResult};
use crate::schema::{SchemaMap, values_equal};

/// Which operation a timeout applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Create,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let ten_minutes = Duration::from_secs(600);
        Self {
            create: ten_minutes,
            read: ten_minutes,
            update: ten_minutes,
            delete: ten_minutes,
        }
    }
}

impl Timeouts {
    /// Same duration for create, update and delete; read keeps the default.
    pub fn uniform(d: Duration) -> Self {
        Self {
            create: d,
            update: d,
            delete: d,
            ..Self::default()
        }
    }

    pub fn get(&self, kind: TimeoutKind) -> Duration {
        match kind {
            TimeoutKind::Create => self.create,
            TimeoutKind::Read => self.read,
            TimeoutKind::Update => self.update,
            TimeoutKind::Delete => self.delete,
        }
    }

    /// Apply a configured `timeouts` block such as `{"create": "30m", "delete": "1h"}`.
    pub fn apply_overrides(&mut self, block: &Map<String, Value>) -> ProviderResult<()> {
        for (key, value) in block {
            let raw = value.as_str().unwrap_or_default();
            let d = parse_duration(raw)
                .ok_or_else(|| ProviderError::Validation(format!("timeouts.{key}: invalid duration {value}")))?;
            match key.as_str() {
                "create" => self.create = d,
                "read" => self.read = d,
                "update" => self.update = d,
                "delete" => self.delete = d,
                other => {
                    return Err(ProviderError::Validation(format!(
                        "timeouts.{other}: unsupported timeout"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Parse `90s`, `30m`, `1h` or `1h30m`.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut total = 0_u64;
    let mut digits = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().ok()?;
        digits.clear();
        total += match c {
            's' => n,
            'm' => n * 60,
            'h' => n * 3600,
            _ => return None,
        };
    }
    if !digits.is_empty() {
        return None;
    }
    Some(Duration::from_secs(total))
}

/// Configuration and state of one resource while a handler runs.
///
/// `attrs` starts as prior state overlaid with the planned configuration. Handlers read
/// arguments from it with the `get_*` accessors and write refreshed attributes back with
/// [`set`](Self::set). `old` keeps the prior state for change detection.
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: SchemaMap,
    id: String,
    attrs: Map<String, Value>,
    old: Map<String, Value>,
    timeouts: Timeouts,
    is_new: bool,
}

static NULL: Value = Value::Null;

impl ResourceData {
    /// Data for a resource about to be created (or a data source about to be read).
    pub fn new(schema: SchemaMap, config: Map<String, Value>, timeouts: Timeouts) -> Self {
        Self {
            schema,
            id: String::new(),
            attrs: config,
            old: Map::new(),
            timeouts,
            is_new: true,
        }
    }

    /// Data for an existing resource; `attrs` is `prior` with `planned` applied on top.
    pub fn existing(
        schema: SchemaMap,
        id: impl Into<String>,
        prior: Map<String, Value>,
        planned: Map<String, Value>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            schema,
            id: id.into(),
            attrs: planned,
            old: prior,
            timeouts,
            is_new: false,
        }
    }

    /// Data holding only an ID, as used by import.
    pub fn from_id(schema: SchemaMap, id: impl Into<String>, timeouts: Timeouts) -> Self {
        Self {
            schema,
            id: id.into(),
            attrs: Map::new(),
            old: Map::new(),
            timeouts,
            is_new: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty ID marks the resource as gone.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_new_resource(&self) -> bool {
        self.is_new
    }

    pub fn timeout(&self, kind: TimeoutKind) -> Duration {
        self.timeouts.get(kind)
    }

    /// Value at a dotted path such as `billing.0.size`; null when absent.
    pub fn get(&self, path: &str) -> &Value {
        lookup(&self.attrs, path)
    }

    /// Value and whether it is set to a non-zero value.
    pub fn get_ok(&self, path: &str) -> Option<&Value> {
        let v = self.get(path);
        (!hwcloud_sdk::request::is_zero(v)).then_some(v)
    }

    pub fn get_string(&self, path: &str) -> String {
        match self.get(path) {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    pub fn get_int(&self, path: &str) -> i64 {
        let v = self.get(path);
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or_default()
    }

    pub fn get_float(&self, path: &str) -> f64 {
        self.get(path).as_f64().unwrap_or_default()
    }

    pub fn get_bool(&self, path: &str) -> bool {
        match self.get(path) {
            Value::Bool(b) => *b,
            Value::String(s) => s == "true",
            _ => false,
        }
    }

    pub fn get_list(&self, path: &str) -> Vec<Value> {
        self.get(path).as_array().cloned().unwrap_or_default()
    }

    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        self.get_list(path)
            .into_iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect()
    }

    pub fn get_map(&self, path: &str) -> BTreeMap<String, String> {
        crate::common::string_map(self.get(path))
    }

    /// Write a top-level attribute. Keys outside the schema are rejected.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> ProviderResult<()> {
        if !self.schema.contains_key(key) {
            return Err(ProviderError::Serialization(format!("invalid attribute key: {key}")));
        }
        self.attrs.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Prior and current value of a top-level attribute.
    pub fn get_change(&self, key: &str) -> (&Value, &Value) {
        (lookup(&self.old, key), lookup(&self.attrs, key))
    }

    pub fn has_change(&self, key: &str) -> bool {
        if self.is_new {
            return !self.get(key).is_null();
        }
        let (old, new) = self.get_change(key);
        match self.schema.get(key) {
            Some(s) => !values_equal(key, s, old, new),
            None => old != new,
        }
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// Whether any attribute other than `keys` changed.
    pub fn has_changes_except(&self, keys: &[&str]) -> bool {
        self.schema
            .keys()
            .filter(|k| !keys.contains(k))
            .any(|k| self.has_change(k))
    }

    /// Attributes in the schema, for persisting.
    pub fn state(&self) -> Map<String, Value> {
        self.schema
            .keys()
            .filter_map(|k| {
                self.attrs
                    .get(*k)
                    .filter(|v| !v.is_null())
                    .map(|v| ((*k).to_string(), v.clone()))
            })
            .collect()
    }
}

fn lookup<'a>(attrs: &'a Map<String, Value>, path: &str) -> &'a Value {
    let mut parts = path.split('.');
    let Some(first) = parts.next() else {
        return &NULL;
    };
    let mut current = attrs.get(first).unwrap_or(&NULL);
    for part in parts {
        current = match (current, part.parse::<usize>()) {
            (Value::Array(items), Ok(i)) => items.get(i).unwrap_or(&NULL),
            (Value::Object(o), _) => o.get(part).unwrap_or(&NULL),
            _ => &NULL,
        };
    }
    current
}
