//! Results of a credential check.

use std::fmt;

use crate::error::InfrastructureError;

/// Why a checker refused the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Denial {
    /// No identity matches the username.
    NotFound,
    /// The identity exists but is blocked.
    Blocked,
    /// The password is wrong.
    BadCredential,
    /// Empty username or password.
    InvalidInput,
}

impl Denial {
    pub fn as_str(&self) -> &'static str {
        match self {
            Denial::NotFound => "not_found",
            Denial::Blocked => "blocked",
            Denial::BadCredential => "bad_credential",
            Denial::InvalidInput => "invalid_input",
        }
    }
}

/// Result of one credential check.
#[derive(Debug)]
pub enum Outcome {
    Granted,
    Denied(Denial),
    /// No decision could be made, the source was unreachable or broken.
    Failed(InfrastructureError),
}

impl Outcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Outcome::Granted)
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Granted => "granted",
            Outcome::Denied(denial) => denial.as_str(),
            Outcome::Failed(_) => "infrastructure_failure",
        }
    }

    /// Returns the denial reason, if any.
    pub fn denial(&self) -> Option<Denial> {
        match self {
            Outcome::Denied(denial) => Some(*denial),
            _ => None,
        }
    }

    /// Returns the infrastructure failure, if any.
    pub fn failure(&self) -> Option<&InfrastructureError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InfrastructureError> for Outcome {
    fn from(err: InfrastructureError) -> Self {
        Outcome::Failed(err)
    }
}

/// Final verdict of an [`crate::Authenticator`] traversal.
#[derive(Debug)]
pub struct Decision {
    /// Name of the checker that produced the outcome.
    pub checker: &'static str,
    pub outcome: Outcome,
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        self.outcome.is_granted()
    }
}

/// Username and password of one attempt.
///
/// `Debug` never prints the password.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a> Credentials<'a> {
    pub fn new(username: &'a str, password: &'a str) -> Self {
        Self { username, password }
    }

    /// Empty values never match anything.
    pub fn is_blank(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
