//! Error types for the searchstack compiler
//!
//! Every failure in this crate is a build-time failure: the compiler performs
//! no I/O, so there is no retry or translation layer. Reconciliation-engine
//! failures (resource creation, throttling) happen outside this crate and are
//! surfaced to the operator verbatim by the engine itself.

use thiserror::Error;

/// Main error type for searchstack operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Validation error for stack configuration and resource specs
    #[error("validation error: {0}")]
    Validation(String),

    /// Dependency graph error (cycle, unknown reference, missing edge)
    #[error("graph error: {0}")]
    Graph(String),

    /// Route table error (duplicate registration, malformed path)
    #[error("route error: {0}")]
    Route(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a graph error with the given message
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Create a route error with the given message
    pub fn route(msg: impl Into<String>) -> Self {
        Self::Route(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
