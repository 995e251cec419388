//! authgate verifies a username and password against a local user store,
//! falling back to an LDAP directory.
//!
//! Every login attempt goes through [`Authenticator::authenticate`], which
//! only ever answers `true` or `false`. [`Authenticator::decide`] exposes the
//! structured [`Outcome`] behind that answer.

#![forbid(unsafe_code)]

pub mod checker;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod ldap;
pub mod outcome;
pub mod telemetry;
pub mod user;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::time::Instant;

pub use checker::CredentialChecker;
pub use config::Configuration;
pub use outcome::{Credentials, Decision, Denial, Outcome};

use crate::config::TlsMode;
use crate::crypto::PasswordManager;
use crate::error::CryptoError;
use crate::ldap::DirectoryChecker;
use crate::user::{LocalChecker, PgUserStore};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Consults credential checkers in order until one grants access.
///
/// Holds no per-attempt state and can be shared between tasks.
pub struct Authenticator {
    checkers: Vec<Box<dyn CredentialChecker>>,
    timeout: Duration,
}

impl Authenticator {
    /// Create a new [`Authenticator`] consulting `checkers` in order.
    pub fn new(checkers: Vec<Box<dyn CredentialChecker>>) -> Self {
        Self {
            checkers,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every attempt to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Local store first, then the directory when one is configured.
    pub fn from_config(
        config: &Configuration,
        pool: PgPool,
    ) -> Result<Self, CryptoError> {
        let local = LocalChecker::new(
            Arc::new(PgUserStore::new(pool)),
            PasswordManager::new(config.argon2.clone())?,
            config.legacy_encoding,
        );
        let mut checkers: Vec<Box<dyn CredentialChecker>> = vec![Box::new(local)];

        if let Some(ldap) = &config.ldap {
            if ldap.tls == TlsMode::None {
                tracing::warn!(
                    host = %ldap.host,
                    "directory credentials will travel in plaintext, consider `tls: ldaps` or `tls: starttls`"
                );
            }
            checkers.push(Box::new(DirectoryChecker::from_config(ldap)));
        }

        Ok(Self::new(checkers).with_timeout(config.attempt_timeout()))
    }

    /// Whether `username` and `password` are valid in any source.
    pub async fn authenticate(&self, username: &str, password: &str) -> bool {
        self.decide(username, password).await.is_granted()
    }

    /// Run the checkers and return the deciding outcome.
    ///
    /// The first granting checker wins. Otherwise the last checker's
    /// outcome is returned.
    pub async fn decide(&self, username: &str, password: &str) -> Decision {
        let credentials = Credentials::new(username, password);

        if credentials.is_blank() {
            let outcome = Outcome::Denied(Denial::InvalidInput);
            telemetry::record("input", &credentials, &outcome);
            return Decision {
                checker: "input",
                outcome,
            };
        }

        let deadline = Instant::now() + self.timeout;
        let mut decision = Decision {
            checker: "none",
            outcome: Outcome::Denied(Denial::NotFound),
        };

        for checker in &self.checkers {
            let outcome = checker.check(&credentials, deadline).await;
            telemetry::record(checker.name(), &credentials, &outcome);

            decision = Decision {
                checker: checker.name(),
                outcome,
            };
            if decision.is_granted() {
                break;
            }
        }

        decision
    }
}
