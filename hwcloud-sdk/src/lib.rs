//! # hwcloud-sdk
//!
//! Signed REST plumbing for HuaweiCloud service APIs.
//!
//! ## Layers
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Service catalog: endpoint host, API version, project scoping |
//! | [`ServiceClient`] | SDK-HMAC-SHA256 signing, retries, OK-code checks, error mapping |
//! | [`request`] | Typed options → JSON body or query string, with field rules |
//! | [`pagination`] | Single, linked, marker, offset and page-number iteration |
//! | [`extract`] | Path search and flattening of JSON responses |
//! | [`services`] | Per-service paths, option structs and calls |
//!
//! ## Feature Flags
//!
//! - **`native-tls`** *(default)*: use the platform's native TLS implementation.
//! - **`rustls`**: use rustls. Recommended for cross-compilation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hwcloud_sdk::{Credentials, ServiceClient};
//! use hwcloud_sdk::services::vpc::{self, CreateVpcOpts};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ServiceClient::builder("vpc", Credentials::aksk("AK", "SK"))
//!         .region("cn-north-4")
//!         .project_id("0123456789abcdef")
//!         .build()?;
//!
//!     let opts = CreateVpcOpts {
//!         name: "demo".to_string(),
//!         cidr: Some("192.168.0.0/16".to_string()),
//!         ..Default::default()
//!     };
//!     let vpc = vpc::create_vpc(&client, &opts).await?;
//!     println!("created {}", vpc["id"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every call returns [`Result<T, SdkError>`](SdkError). Non-OK responses carry the
//! service, method, URL, status and the parsed `error_code`. A 404 becomes
//! [`SdkError::ResourceNotFound`]. Transient errors (`NetworkError`, `Timeout`,
//! `RateLimited`) are retried with exponential backoff.

pub mod catalog;
mod client;
mod error;
pub mod extract;
mod http_client;
pub mod pagination;
pub mod request;
pub mod services;
mod sign;
mod utils;

pub use client::{
    Credentials, RequestOpts, Response, ServiceClient, ServiceClientBuilder, create_http_client,
    default_ok_codes,
};
pub use error::{Result, SdkError};
pub use http_client::DEFAULT_MAX_RETRIES;
pub use sign::Signer;

pub use utils::datetime;
pub use utils::log_sanitizer::truncate_for_log;
