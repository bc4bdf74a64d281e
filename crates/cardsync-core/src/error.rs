use thiserror::Error;

use crate::remote::ApiError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the data access and sync layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Timeout, DNS/socket failure or an explicit offline state.
    #[error("Network unavailable: {0}")]
    Connectivity(#[source] ApiError),

    /// A write was attempted while the device is offline.
    #[error("This action requires an internet connection")]
    RequiresConnectivity,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Authorization failure or server-side rejection.
    #[error("Remote request failed: {0}")]
    Remote(#[source] ApiError),
}

impl Error {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connectivity(_) | Error::RequiresConnectivity)
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        if err.is_connectivity() {
            Error::Connectivity(err)
        } else {
            Error::Remote(err)
        }
    }
}

/// Failures of the local key-value substrate.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse {key}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
