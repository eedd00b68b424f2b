//! Shared helpers for acceptance tests

#![allow(dead_code)]

use std::sync::Arc;

use hwcloud_provider::types::ResourceState;
use hwcloud_provider::{
    Config, LifecycleService, ProviderResult, ProviderSettings, ResourceRegistry, ServiceContext,
};
use serde_json::{Map, Value};

/// Skip the test when an environment variable is missing
#[macro_export]
macro_rules! skip_if_no_credentials {
    ($($var:expr),+) => {
        $(
            if std::env::var($var).is_err() {
                eprintln!("skipping test: {} is not set", $var);
                return;
            }
        )+
    };
}

/// Assert `Option` is `Some` and unwrap it (fail the test otherwise).
#[macro_export]
macro_rules! require_some {
    ($expr:expr $(,)?) => {{
        let opt = $expr;
        assert!(opt.is_some(), "expected Some(..), got None");
        let Some(val) = opt else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let opt = $expr;
        assert!(opt.is_some(), "{}", format_args!($($msg)+));
        let Some(val) = opt else {
            return;
        };
        val
    }};
}

/// Assert `Result` is `Ok` and unwrap it (fail the test otherwise).
///
/// Only the error is formatted, so the `Ok` type needs no `Debug` impl.
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        if let Err(e) = &res {
            panic!("expected Ok(..), got Err({e:?})");
        }
        let Ok(val) = res else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        if let Err(e) = &res {
            panic!("{}: {e:?}", format_args!($($msg)+));
        }
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// Unique name for a test resource, e.g. `tf-acc-test-1a2b3c4d`.
pub fn random_name() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("tf-acc-test-{}", &uuid.to_string()[..8])
}

/// Lifecycle service over the live API, configured from `HW_*` variables.
pub struct TestContext {
    pub service: LifecycleService,
}

impl TestContext {
    pub fn from_env() -> ProviderResult<Self> {
        let config = Config::builder().env(ProviderSettings::from_env()).build()?;
        let ctx = ServiceContext::new(Arc::new(config), Arc::new(ResourceRegistry::with_defaults()));
        Ok(Self {
            service: LifecycleService::new(Arc::new(ctx)),
        })
    }
}

/// Object body of a `json!` literal.
pub fn config(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Best-effort destroy used when a test bails out after creating something.
pub async fn cleanup(service: &LifecycleService, state: &ResourceState) {
    if let Err(e) = service.destroy(state).await {
        eprintln!("cleanup of {} failed: {e}", state.address());
    }
}
