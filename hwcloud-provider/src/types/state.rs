//! Persisted resource state

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    #[default]
    Managed,
    Data,
}

/// State of one resource or data source instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(default)]
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceState {
    /// `type.name`, or `data.type.name` for data sources.
    pub fn address(&self) -> String {
        match self.mode {
            ResourceMode::Managed => format!("{}.{}", self.type_name, self.name),
            ResourceMode::Data => format!("data.{}.{}", self.type_name, self.name),
        }
    }

    /// Attribute by name; `id` is served from the ID.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        if key == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.attributes.get(key).cloned()
    }
}

/// The state file: every instance the CLI manages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Bumped on every write.
    pub serial: u64,
    #[serde(default)]
    pub resources: Vec<ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: 1,
            serial: 0,
            resources: Vec::new(),
        }
    }
}

impl StateFile {
    pub fn find(&self, mode: ResourceMode, type_name: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.mode == mode && r.type_name == type_name && r.name == name)
    }

    /// Insert or replace the entry with the same address.
    pub fn upsert(&mut self, state: ResourceState) {
        self.serial += 1;
        match self
            .resources
            .iter_mut()
            .find(|r| r.mode == state.mode && r.type_name == state.type_name && r.name == state.name)
        {
            Some(existing) => *existing = state,
            None => self.resources.push(state),
        }
    }

    /// Remove an entry; returns it when it existed.
    pub fn remove(&mut self, mode: ResourceMode, type_name: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.mode == mode && r.type_name == type_name && r.name == name)?;
        self.serial += 1;
        Some(self.resources.remove(pos))
    }
}
