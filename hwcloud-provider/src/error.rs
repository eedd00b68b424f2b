//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

// Re-export SDK error type
pub use hwcloud_sdk::SdkError;

/// Provider layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum ProviderError {
    /// SDK error (converted from the SDK layer)
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// Another error with a leading description of the failed operation
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<ProviderError>,
    },

    /// Invalid provider configuration
    #[error("Invalid provider configuration: {0}")]
    Config(String),

    /// Configuration does not match the schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// No resource or data source registered under this name
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// Resource could not be found (import, data source lookups)
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A refresh reported a state that is neither pending nor target
    #[error("unexpected state '{state}', wanted target '{}'", target.join(", "))]
    UnexpectedState { state: String, target: Vec<String> },

    /// A wait ran past its deadline
    #[error("timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout_secs}s)", target.join(", "))]
    WaitTimeout {
        last_state: String,
        target: Vec<String>,
        timeout_secs: u64,
    },

    /// The refreshed object kept coming back as not found
    #[error("couldn't find resource ({checks} retries)")]
    NotFoundChecks { checks: u32 },

    /// A change that cannot be planned (e.g. a non-updatable argument)
    #[error("Plan error: {0}")]
    Plan(String),

    /// State or attribute (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProviderError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::Validation(_)
            | Self::UnknownResourceType(_)
            | Self::ResourceNotFound(_)
            | Self::Plan(_) => true,
            Self::Sdk(e) => e.is_expected(),
            Self::Context { source, .. } => source.is_expected(),
            _ => false,
        }
    }

    /// Whether the error means the remote object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Sdk(e) => e.is_not_found(),
            Self::ResourceNotFound(_) => true,
            Self::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The SDK error at the bottom of a context chain.
    #[must_use]
    pub fn sdk_error(&self) -> Option<&SdkError> {
        match self {
            Self::Sdk(e) => Some(e),
            Self::Context { source, .. } => source.sdk_error(),
            _ => None,
        }
    }

    #[must_use]
    pub fn with_context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }
}

/// `.context("error creating VPC")` on any result whose error converts into [`ProviderError`].
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> ProviderResult<T>;
}

impl<T, E: Into<ProviderError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> ProviderResult<T> {
        self.map_err(|e| e.into().with_context(message))
    }
}

/// Provider layer Result type alias
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> SdkError {
        SdkError::ResourceNotFound {
            service: "vpc".to_string(),
            url: "https://vpc/v1/p/subnets/s".to_string(),
            raw_message: None,
        }
    }

    #[test]
    fn context_prefixes_message() {
        let err: ProviderResult<()> = Err(not_found()).context("error retrieving VPC subnet");
        let err = err.err().unwrap_or_else(|| panic!("expected error"));
        assert!(err.to_string().starts_with("error retrieving VPC subnet: "));
        assert!(err.is_not_found());
        assert!(err.sdk_error().is_some_and(SdkError::is_not_found));
    }

    #[test]
    fn expected_classification() {
        assert!(ProviderError::Validation("x".into()).is_expected());
        assert!(
            ProviderError::Validation("x".into())
                .with_context("plan")
                .is_expected()
        );
        assert!(
            !ProviderError::WaitTimeout {
                last_state: "PENDING".into(),
                target: vec!["ACTIVE".into()],
                timeout_secs: 10,
            }
            .is_expected()
        );
    }

    #[test]
    fn wait_errors_display() {
        let e = ProviderError::UnexpectedState {
            state: "ERROR".into(),
            target: vec!["ACTIVE".into(), "DISABLE".into()],
        };
        assert_eq!(
            e.to_string(),
            "unexpected state 'ERROR', wanted target 'ACTIVE, DISABLE'"
        );
    }
}
