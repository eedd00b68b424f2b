//! Shared helpers for live API tests

#![allow(dead_code)]

use hwcloud_sdk::{Credentials, ServiceClient};

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

fn var(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// Client for `service` built from `HW_ACCESS_KEY`, `HW_SECRET_KEY`,
/// `HW_REGION_NAME` and `HW_PROJECT_ID`.
pub fn client(service: &str) -> hwcloud_sdk::Result<ServiceClient> {
    ServiceClient::builder(service, Credentials::aksk(var("HW_ACCESS_KEY"), var("HW_SECRET_KEY")))
        .region(var("HW_REGION_NAME"))
        .project_id(var("HW_PROJECT_ID"))
        .build()
}

pub fn test_name() -> String {
    format!("sdk-test-{}", chrono::Utc::now().timestamp())
}
