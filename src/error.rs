//! Error types for the cascade engine and the data source runtime.
//!
//! None of these escape the public engine operations for configuration
//! problems; they are logged at the boundary and degrade to "not matched" or
//! an empty option list. They exist so the degradation is explicit.

use std::time::Duration;
use thiserror::Error;

/// A `matches` trigger carried a pattern that does not compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pattern `{pattern}`: {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

/// A transform expression is malformed or does not fit the payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("empty transform expression")]
    EmptyExpression,

    #[error("empty path segment in `{0}`")]
    EmptySegment(String),

    #[error("unsupported segment `{0}`")]
    UnsupportedSegment(String),

    #[error("unbalanced braces in `{0}`")]
    UnbalancedBraces(String),

    #[error("malformed object mapping `{0}`")]
    InvalidMapping(String),

    #[error("expected an array at `{0}`")]
    NotAnArray(String),

    #[error("expected an object at `{0}`")]
    NotAnObject(String),

    #[error("transform result is not a list")]
    NotAList,
}

/// Failure reported by a [`crate::datasource::Transport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    /// The request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(String),

    /// The response body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Why a single data source load settled without data.
///
/// `Clone` because the outcome travels through a shared future to every
/// caller that joined the same in-flight load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("load cancelled")]
    Cancelled,
}

/// Problems reading engine or form configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}
