//! IBM Cloud provider error types

use carina_core::provider::ProviderError;
use carina_core::resource::ResourceId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IbmError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IAM authentication failed: {0}")]
    Auth(String),

    #[error("invalid ID '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl IbmError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IbmError::NotFound(_))
    }

    /// Convert into a ProviderError attributed to a resource
    pub fn for_resource(self, id: &ResourceId) -> ProviderError {
        ProviderError::from(self).for_resource(id.clone())
    }
}

pub type Result<T> = std::result::Result<T, IbmError>;

impl From<IbmError> for ProviderError {
    fn from(e: IbmError) -> Self {
        let message = e.to_string();
        if e.is_not_found() {
            ProviderError::not_found(message)
        } else {
            ProviderError::new(message).with_cause(e)
        }
    }
}
