use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

pub type HttpStoreResult<T> = Result<T, HttpStoreError>;

/// Failures talking to the store host.
#[derive(Debug, Error)]
pub enum HttpStoreError {
    #[error("failed to build HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to send request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("store host rejected `{path}` with {status}: {message}")]
    RequestStatus {
        path: String,
        status: StatusCode,
        message: String,
    },
    #[error("failed to decode response from `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl From<HttpStoreError> for StorageError {
    fn from(err: HttpStoreError) -> Self {
        match err {
            HttpStoreError::RequestStatus {
                status: StatusCode::CONFLICT,
                message,
                ..
            } => StorageError::conflict(message),
            HttpStoreError::RequestStatus {
                status: StatusCode::NOT_FOUND,
                message,
                ..
            } => StorageError::not_found(message),
            other => StorageError::unavailable("store host request failed".into(), other),
        }
    }
}
