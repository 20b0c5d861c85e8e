use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal errors. Any of these aborts the command before the cache is written.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid option: {0}")]
    Validation(String),

    #[error("failed to fetch domains from '{source_name}': {reason}")]
    SourceFetch { source_name: String, reason: String },

    #[error("invalid cache file at {}: {reason}", path.display())]
    CacheLoad { path: PathBuf, reason: String },

    #[error("failed to save cache file at {}: {reason}", path.display())]
    CacheSave { path: PathBuf, reason: String },

    #[error("failed to build DNS resolver: {0}")]
    ResolverInit(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn source_fetch(source_name: &str, reason: impl std::fmt::Display) -> Self {
        Error::SourceFetch {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn cache_load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::CacheLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cache_save(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::CacheSave {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the kind/category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::SourceFetch { .. } => ErrorKind::SourceFetch,
            Error::CacheLoad { .. } => ErrorKind::CacheLoad,
            Error::CacheSave { .. } => ErrorKind::CacheSave,
            Error::ResolverInit(_) => ErrorKind::ResolverInit,
        }
    }
}

/// Lightweight error category for pattern matching without borrowing the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    SourceFetch,
    CacheLoad,
    CacheSave,
    ResolverInit,
}

impl ErrorKind {
    /// Whether this error was raised before any network or disk activity.
    pub fn is_validation(self) -> bool {
        matches!(self, ErrorKind::Validation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::SourceFetch => "SOURCE_FETCH",
            ErrorKind::CacheLoad => "CACHE_LOAD",
            ErrorKind::CacheSave => "CACHE_SAVE",
            ErrorKind::ResolverInit => "RESOLVER_INIT",
        }
    }
}

/// Why a single domain could not be resolved. Never fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("no such domain")]
    NxDomain,

    #[error("no address records")]
    NoRecords,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("server failure: {0}")]
    ServerFailure(String),

    #[error("only excluded addresses returned")]
    Filtered,

    #[error("invalid domain name: {0}")]
    InvalidName(String),

    #[error("{0}")]
    Other(String),
}

impl LookupError {
    /// Retrying on a later run would give the same answer.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            LookupError::NxDomain
                | LookupError::NoRecords
                | LookupError::Filtered
                | LookupError::InvalidName(_)
        )
    }

    /// Transient failures (timeouts, server errors) might succeed on a later run.
    pub fn is_transient(&self) -> bool {
        !self.is_definitive()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupError::NxDomain => "NXDOMAIN",
            LookupError::NoRecords => "NO_RECORDS",
            LookupError::Timeout(_) => "TIMEOUT",
            LookupError::ServerFailure(_) => "SERVFAIL",
            LookupError::Filtered => "FILTERED",
            LookupError::InvalidName(_) => "INVALID_NAME",
            LookupError::Other(_) => "OTHER",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
