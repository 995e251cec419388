//! Search-then-bind verification against a directory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::ldap_escape;
use tokio::time::{Instant, timeout};
use zeroize::Zeroizing;

use crate::checker::{CredentialChecker, within};
use crate::config::Ldap as LdapConfig;
use crate::error::{DirectoryError, InfrastructureError, Phase};
use crate::ldap::{DirectoryConnector, DirectorySession, Ldap3Connector};
use crate::outcome::{Credentials, Denial, Outcome};

const NAME: &str = "directory";
/// Time left to unbind once the attempt is decided.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Directory credential checker.
///
/// A service-account connection resolves the user's DN. A second, fresh
/// connection then binds as that DN with the supplied password, so a refused
/// bind never touches the service-account session.
pub struct DirectoryChecker {
    connector: Arc<dyn DirectoryConnector>,
    service_account: Option<(String, Zeroizing<String>)>,
    search_base: String,
    login_attribute: String,
}

impl DirectoryChecker {
    /// Create a new [`DirectoryChecker`].
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        search_base: impl Into<String>,
        login_attribute: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            service_account: None,
            search_base: search_base.into(),
            login_attribute: login_attribute.into(),
        }
    }

    /// Bind as `dn` before searching.
    pub fn service_account(
        mut self,
        dn: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.service_account = Some((dn.into(), Zeroizing::new(password.into())));
        self
    }

    /// Build a checker talking to the configured server with `ldap3`.
    pub fn from_config(config: &LdapConfig) -> Self {
        let checker = Self::new(
            Arc::new(Ldap3Connector::new(config)),
            &config.search_base,
            &config.login_attribute,
        );

        match (&config.user, &config.password) {
            (Some(user), Some(password)) => {
                checker.service_account(user, password.as_str())
            },
            _ => checker,
        }
    }

    /// Filter matching a person whose login attribute equals `username`.
    pub fn filter(&self, username: &str) -> String {
        format!(
            "(&(objectClass=person)({}={}))",
            self.login_attribute,
            ldap_escape(username)
        )
    }

    /// Authenticate the service account, then look the user up.
    async fn resolve(
        &self,
        session: &mut dyn DirectorySession,
        username: &str,
        deadline: Instant,
    ) -> Result<Option<String>, InfrastructureError> {
        if let Some((dn, password)) = &self.service_account {
            let result =
                within(deadline, Phase::Connect, session.simple_bind(dn, password))
                    .await?;

            if !result.is_success() {
                return Err(InfrastructureError::new(
                    Phase::Connect,
                    DirectoryError::ServiceBind {
                        code: result.code,
                        text: result.text,
                    },
                ));
            }
        }

        let filter = self.filter(username);
        let mut entries = within(
            deadline,
            Phase::Search,
            session.search(&self.search_base, &filter),
        )
        .await?;

        if entries.len() > 1 {
            tracing::warn!(
                %username,
                count = entries.len(),
                "several directory entries match, using the first one"
            );
        }

        Ok((!entries.is_empty()).then(|| entries.swap_remove(0)))
    }

    async fn close(&self, session: Box<dyn DirectorySession>, role: &'static str) {
        match timeout(CLOSE_GRACE, session.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => {
                tracing::debug!(role, error = %err, "directory connection closed uncleanly")
            },
            Err(_) => tracing::debug!(role, "directory unbind timed out"),
        }
    }
}

#[async_trait]
impl CredentialChecker for DirectoryChecker {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn check(
        &self,
        credentials: &Credentials<'_>,
        deadline: Instant,
    ) -> Outcome {
        // An empty password turns a simple bind into an anonymous bind.
        if credentials.is_blank() {
            return Outcome::Denied(Denial::InvalidInput);
        }

        let mut service =
            match within(deadline, Phase::Connect, self.connector.open()).await {
                Ok(session) => session,
                Err(err) => return err.into(),
            };
        let resolved = self
            .resolve(service.as_mut(), credentials.username, deadline)
            .await;
        self.close(service, "service").await;

        let dn = match resolved {
            Ok(Some(dn)) => dn,
            Ok(None) => return Outcome::Denied(Denial::NotFound),
            Err(err) => return err.into(),
        };

        let mut user =
            match within(deadline, Phase::Bind, self.connector.open()).await {
                Ok(session) => session,
                Err(err) => return err.into(),
            };
        let bind = within(
            deadline,
            Phase::Bind,
            user.simple_bind(&dn, credentials.password),
        )
        .await;
        self.close(user, "user").await;

        match bind {
            Ok(result) if result.is_success() => Outcome::Granted,
            Ok(result) => {
                tracing::debug!(
                    username = credentials.username,
                    %dn,
                    code = result.code,
                    "directory refused user bind"
                );
                Outcome::Denied(Denial::BadCredential)
            },
            Err(err) => err.into(),
        }
    }
}
