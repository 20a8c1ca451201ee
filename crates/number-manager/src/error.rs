//! Engine error types.

use billing_client::BillingError;
use number_store::{ProviderName, StoreError};
use telnyx_client::TelnyxError;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a carrier adapter.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Telnyx error: {0}")]
    Telnyx(#[from] TelnyxError),

    #[error("Provider rejected request: {0}")]
    Rejected(String),

    #[error("{operation} is not implemented for provider {provider}")]
    Unimplemented {
        provider: ProviderName,
        operation: &'static str,
    },
}

/// Failures delivering an outbound event.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected event: {status} - {message}")]
    Rejected { status: u16, message: String },
}

/// Number engine error type.
#[derive(Error, Debug)]
pub enum NumberError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient balance for customer {0}")]
    InsufficientBalance(Uuid),

    #[error("Number already exists: {0}")]
    AlreadyExists(String),

    #[error("Number not found: {0}")]
    NotFound(Uuid),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(ProviderName),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl NumberError {
    /// Convert a storage error raised while working on a known record.
    pub(crate) fn from_store(id: Uuid, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => NumberError::NotFound(id),
            other => other.into(),
        }
    }
}

impl From<StoreError> for NumberError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidData(message) => NumberError::Validation(message),
            StoreError::AlreadyExists(number) => NumberError::AlreadyExists(number),
            other => NumberError::Store(other),
        }
    }
}

/// Result type alias for engine operations.
pub type NumberResult<T> = Result<T, NumberError>;
