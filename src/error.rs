//! Error types for authgate.
//!
//! Every collaborator has its own error enum. Once an attempt crosses a
//! checker boundary, collaborator errors are wrapped into an
//! [`InfrastructureError`] tagged with the [`Phase`] that was running.

use std::fmt;

use ldap3::LdapError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Step of an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Local store lookup.
    Lookup,
    /// Directory connection and service-account bind.
    Connect,
    /// Directory identity search.
    Search,
    /// End-user bind on the second directory connection.
    Bind,
}

impl Phase {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lookup => "lookup",
            Phase::Connect => "connect",
            Phase::Search => "search",
            Phase::Bind => "bind",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The store or the directory could not give an answer.
///
/// This is never a statement about the credentials themselves.
#[derive(Debug, Error)]
#[error("{phase} failed: {source}")]
pub struct InfrastructureError {
    pub phase: Phase,
    #[source]
    pub source: BoxError,
}

impl InfrastructureError {
    /// Create a new [`InfrastructureError`].
    pub fn new<E>(phase: Phase, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            phase,
            source: source.into(),
        }
    }
}

/// The attempt ran out of time.
#[derive(Debug, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// Local user store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("{count} active records share the same username")]
    AmbiguousUser { count: usize },
}

/// Directory protocol errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Ldap(#[from] LdapError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("service account bind refused with code {code}: {text}")]
    ServiceBind { code: u32, text: String },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Password hashing errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),

    #[error("password does not match")]
    Mismatch,
}
