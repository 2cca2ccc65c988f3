//! Error types for rotas-graph.

use std::fmt;

use thiserror::Error;

/// A failed HTTP exchange, with whatever diagnostic payload the server sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpFailure {
    /// Non-2xx response. `body` is the raw response text.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// 2xx response whose body was not the JSON we expected.
    #[error("invalid JSON response: {0}")]
    Decode(String),
}

impl HttpFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One step of the resolver chain, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Site,
    Drive,
    File,
    Worksheet,
    Table,
    Rows,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Site => "site",
            Stage::Drive => "drive",
            Stage::File => "file",
            Stage::Worksheet => "worksheet",
            Stage::Table => "table",
            Stage::Rows => "rows",
        }
    }

    pub(crate) fn fail(self, reason: impl Into<String>) -> GraphError {
        GraphError::Resolution {
            stage: self,
            reason: reason.into(),
            status: None,
        }
    }

    /// Tag a failed HTTP exchange, keeping its status code.
    pub(crate) fn fail_http(self, failure: &HttpFailure) -> GraphError {
        GraphError::Resolution {
            stage: self,
            reason: failure.to_string(),
            status: failure.status(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the Graph pipeline.
///
/// `Auth` means the credentials (or the identity provider) are the problem;
/// `Resolution` means credentials worked but something downstream moved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("authentication failed: {0}")]
    Auth(#[source] HttpFailure),

    #[error("resolution failed at stage '{stage}': {reason}")]
    Resolution {
        stage: Stage,
        reason: String,
        /// HTTP status of the failed call, when there was one.
        status: Option<u16>,
    },
}

impl GraphError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            GraphError::Resolution { stage, .. } => Some(*stage),
            GraphError::Auth(_) => None,
        }
    }

    /// Graph rejected the bearer token itself.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            GraphError::Resolution { status, .. } => *status == Some(401),
            GraphError::Auth(failure) => failure.status() == Some(401),
        }
    }
}

/// Missing or malformed environment configuration. Raised at startup only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
