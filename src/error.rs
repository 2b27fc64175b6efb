use thiserror::Error;

use crate::projection::ProjectionError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Projection failed for {issue} field '{field}': {source}")]
    Projection {
        issue: String,
        field: String,
        #[source]
        source: ProjectionError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// エラーの大分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Credential,
    Query,
    Projection,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfiguration(_) | Error::ConfigurationMissing(_) => ErrorKind::Config,
            Error::Credential(_) => ErrorKind::Credential,
            Error::RequestFailed(_)
            | Error::JsonParsing(_)
            | Error::AuthenticationFailed(_)
            | Error::ApiError { .. } => ErrorKind::Query,
            Error::Projection { .. } => ErrorKind::Projection,
            Error::IoError(_) => ErrorKind::Io,
        }
    }

    /// プロセス終了コード（成功時の0は含まない）
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Config => 2,
            ErrorKind::Credential => 3,
            ErrorKind::Query => 4,
            ErrorKind::Projection => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
