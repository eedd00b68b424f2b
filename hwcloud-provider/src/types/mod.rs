//! State and plan types

mod plan;
mod state;

pub use plan::{Plan, PlanAction};
pub use state::{ResourceMode, ResourceState, StateFile};
