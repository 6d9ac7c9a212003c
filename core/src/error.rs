//! Error types for the exercise catalog client.
//!
//! # Design
//! One taxonomy serves both execution modes. `Validation` failures are raised
//! before any I/O, `Api` covers everything the remote exchange can produce and
//! `Cache` covers the disk tier of the reference cache. Every type here is
//! `Clone`: a failed reference fetch is handed, unchanged, to every caller that
//! was waiting on it.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::types::ReferenceListName;

/// Top-level error returned by both facades.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Caller input rejected before any request is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown reference list `{0}` (expected bodyPartList, equipmentList or targetList)")]
    UnknownReferenceList(String),

    #[error("unknown filter type `{0}` (expected bodyPart, equipment or target)")]
    UnknownFilterType(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} cannot be the dot segment `{value}`")]
    DotSegment { field: &'static str, value: String },

    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: i64 },

    #[error("{0} not found in environment")]
    MissingConfig(&'static str),

    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Failures of the remote exchange or of interpreting its response.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The provider returned 404.
    #[error("resource not found")]
    NotFound,

    /// The provider returned a non-2xx status other than 404.
    #[error("API request failed: {status} {body}")]
    Http { status: u16, body: String },

    /// The exchange itself could not complete.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The task leading a shared reference fetch went away without a result.
    #[error("shared fetch was abandoned before it completed")]
    Abandoned,
}

impl ApiError {
    /// HTTP status reported by the provider, when the failure carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::NotFound => Some(404),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection refused, timeout, unreadable body and the like.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failed: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Failures of the disk tier.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to serialize {name}: {message}")]
    Serialization {
        name: ReferenceListName,
        message: String,
    },

    #[error("malformed cache file {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("no cached data found for {0}")]
    NotCached(ReferenceListName),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// The underlying I/O error kind, for `Io` failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            CacheError::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}
