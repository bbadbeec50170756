//! Error types shared by the Google Sheets backend.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::{
    backend::error::{AuthError, FetchError, RegError, SaveError},
    storage::StorageError,
};

/// Convenient result alias returning [`SheetsDaoError`] failures.
pub type SheetsResult<T> = Result<T, SheetsDaoError>;

/// Failures that can occur while talking to the Sheets API.
#[derive(Debug, Error)]
pub enum SheetsDaoError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Sheets client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A configured base URL could not be turned into a request URL.
    #[error("invalid Sheets URL `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
    /// A request could not be sent or its response never arrived.
    #[error("failed to send Sheets request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Sheets answered with a non-success status.
    #[error("unexpected Sheets response status {status} for `{path}`: {message}")]
    RequestStatus {
        path: String,
        status: StatusCode,
        message: String,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode Sheets response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A row could not be encoded for the wire.
    #[error("failed to encode row for `{range}`")]
    EncodeRow {
        range: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SheetsDaoError {
    /// Whether the bearer token was refused.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SheetsDaoError::RequestStatus { status, .. } if *status == StatusCode::UNAUTHORIZED
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            SheetsDaoError::RequestSend { source, .. }
            | SheetsDaoError::DecodeResponse { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

impl From<SheetsDaoError> for StorageError {
    fn from(err: SheetsDaoError) -> Self {
        if err.is_timeout() {
            StorageError::timeout(err.to_string())
        } else {
            StorageError::unavailable(err.to_string(), err)
        }
    }
}

impl From<SheetsDaoError> for FetchError {
    fn from(err: SheetsDaoError) -> Self {
        if err.is_unauthorized() {
            FetchError::NotAuthenticated
        } else {
            FetchError::Storage(err.into())
        }
    }
}

impl From<SheetsDaoError> for SaveError {
    fn from(err: SheetsDaoError) -> Self {
        if err.is_unauthorized() {
            SaveError::NotAuthenticated
        } else {
            SaveError::Storage(err.into())
        }
    }
}

impl From<SheetsDaoError> for RegError {
    fn from(err: SheetsDaoError) -> Self {
        FetchError::from(err).into()
    }
}

impl From<SheetsDaoError> for AuthError {
    fn from(err: SheetsDaoError) -> Self {
        FetchError::from(err).into()
    }
}
