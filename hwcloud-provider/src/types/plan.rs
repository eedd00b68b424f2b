//! Planned changes

use serde::Serialize;
use serde_json::{Map, Value};

use crate::resource_data::Timeouts;
use crate::schema::AttributeChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update,
    /// Delete, then create.
    Replace,
    NoOp,
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::NoOp => "no-op",
        };
        f.write_str(s)
    }
}

/// What `apply` would do for one resource.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub action: PlanAction,
    pub changes: Vec<AttributeChange>,
    /// Prepared configuration (defaults applied, computed values carried over).
    pub planned: Map<String, Value>,
    #[serde(skip)]
    pub timeouts: Timeouts,
}
