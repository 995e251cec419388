//! Directory connections.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap as Ldap3, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};

use crate::config::{Ldap as LdapConfig, TlsMode};
use crate::error::DirectoryError;

/// LDAP `success` result code.
pub const SUCCESS: u32 = 0;

/// Result of a simple bind that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindResult {
    pub code: u32,
    pub text: String,
}

impl BindResult {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS
    }
}

/// Opens fresh directory connections.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Open a new, unauthenticated connection.
    async fn open(&self) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// One open directory connection, exclusively owned by its caller.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind. A refused bind is `Ok` with a non-success code.
    async fn simple_bind(
        &mut self,
        dn: &str,
        password: &str,
    ) -> Result<BindResult, DirectoryError>;

    /// Subtree search returning the DN of every matching entry.
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
    ) -> Result<Vec<String>, DirectoryError>;

    /// Unbind and release the connection.
    async fn close(self: Box<Self>) -> Result<(), DirectoryError>;
}

/// [`DirectoryConnector`] backed by `ldap3`.
#[derive(Debug, Clone)]
pub struct Ldap3Connector {
    url: String,
    starttls: bool,
    timeout: Duration,
}

impl Ldap3Connector {
    /// Create a new [`Ldap3Connector`].
    pub fn new(config: &LdapConfig) -> Self {
        Self {
            url: config.url(),
            starttls: config.tls == TlsMode::StartTls,
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn open(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.starttls);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url).await?;
        ldap3::drive!(conn);

        Ok(Box::new(Ldap3Session {
            ldap,
            timeout: self.timeout,
        }))
    }
}

struct Ldap3Session {
    ldap: Ldap3,
    timeout: Duration,
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn simple_bind(
        &mut self,
        dn: &str,
        password: &str,
    ) -> Result<BindResult, DirectoryError> {
        let result = self
            .ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await?;

        Ok(BindResult {
            code: result.rc,
            text: result.text,
        })
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
    ) -> Result<Vec<String>, DirectoryError> {
        // "1.1" asks for no attributes, only the DN is needed.
        let (entries, _) = self
            .ldap
            .with_timeout(self.timeout)
            .search(base, Scope::Subtree, filter, vec!["1.1"])
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).dn)
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), DirectoryError> {
        let mut ldap = self.ldap;
        ldap.unbind().await?;
        Ok(())
    }
}
