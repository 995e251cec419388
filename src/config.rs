//! Configuration manager for authgate.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const LDAP_PASSWORD_ENV: &str = "LDAP_PASSWORD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Related to PostgreSQL configuration.
    pub postgres: Option<Postgres>,
    /// Related to LDAP3 configuration.
    /// Without it, only the local store is consulted.
    pub ldap: Option<Ldap>,
    /// Related to Argon2 configuration.
    pub argon2: Option<Argon2>,
    /// Encoding of credentials inherited from a previous system.
    #[serde(default)]
    pub legacy_encoding: LegacyEncoding,
    /// Upper bound, in seconds, of a whole authentication attempt.
    #[serde(default = "default_attempt_timeout")]
    pub timeout: u64,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            postgres: None,
            ldap: None,
            argon2: None,
            legacy_encoding: LegacyEncoding::default(),
            timeout: default_attempt_timeout(),
            path: PathBuf::default(),
        }
    }
}

fn default_attempt_timeout() -> u64 {
    15
}

/// PostgreSQL configuration.
#[derive(Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
    /// Seconds to wait for a pooled connection.
    pub acquire_timeout: Option<u64>,
}

impl fmt::Debug for Postgres {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Postgres")
            .field("address", &self.address)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Legacy credential encodings accepted by the local store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyEncoding {
    /// Only Argon2 PHC strings are accepted.
    #[default]
    None,
    /// `base64(password)`, as written by the previous system.
    Base64,
}

/// Transport security towards the directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plaintext `ldap://`.
    #[default]
    None,
    /// `ldaps://`.
    Ldaps,
    /// `ldap://` upgraded with StartTLS.
    StartTls,
}

/// LDAP configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Ldap {
    /// Hostname for LDAP instance.
    pub host: String,
    #[serde(default = "default_ldap_port")]
    pub port: u16,
    /// Service account DN used for searches.
    pub user: Option<String>,
    /// Service account password.
    /// Read from `LDAP_PASSWORD` when missing.
    pub password: Option<String>,
    /// Search base DN.
    pub search_base: String,
    /// Attribute holding the login name, e.g. `uid` or `sAMAccountName`.
    #[serde(default = "default_login_attribute")]
    pub login_attribute: String,
    /// Connection and operation timeout in seconds.
    #[serde(default = "default_ldap_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub tls: TlsMode,
}

fn default_ldap_port() -> u16 {
    389
}

fn default_login_attribute() -> String {
    "uid".to_owned()
}

fn default_ldap_timeout() -> u64 {
    10
}

impl Ldap {
    /// URL handed to the LDAP client.
    pub fn url(&self) -> String {
        let scheme = match self.tls {
            TlsMode::Ldaps => "ldaps",
            TlsMode::None | TlsMode::StartTls => "ldap",
        };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("ldap.host", "must not be empty"));
        }
        if self.search_base.trim().is_empty() {
            return Err(invalid("ldap.search_base", "must not be empty"));
        }
        if !is_attribute_descriptor(&self.login_attribute) {
            return Err(invalid(
                "ldap.login_attribute",
                format!("`{}` is not an attribute name", self.login_attribute),
            ));
        }
        if self.timeout == 0 {
            return Err(invalid("ldap.timeout", "must be greater than zero"));
        }
        if self.user.is_some() != self.password.is_some() {
            return Err(invalid(
                "ldap.user",
                "service account needs both `user` and `password`",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Ldap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ldap")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("search_base", &self.search_base)
            .field("login_attribute", &self.login_attribute)
            .field("timeout", &self.timeout)
            .field("tls", &self.tls)
            .finish()
    }
}

/// RFC 4512 `descr`: a letter followed by letters, digits or hyphens.
fn is_attribute_descriptor(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Upper bound of a whole authentication attempt.
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Parse and validate a YAML document.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str::<Configuration>(yaml)?.prepare(env_var)
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, ConfigError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let file = File::open(&file_path)?;
        let mut config =
            serde_yaml::from_reader::<_, Configuration>(file)?.prepare(env_var)?;
        config.path = file_path;

        tracing::debug!(path = %config.path.display(), "configuration loaded");

        Ok(Arc::new(config))
    }

    /// Apply environment overrides, then validate.
    fn prepare<F>(mut self, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // service password may live outside of the file.
        if let Some(ldap) = self.ldap.as_mut() {
            if ldap.password.is_none() {
                ldap.password = env(LDAP_PASSWORD_ENV);
            }
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout == 0 {
            return Err(invalid("timeout", "must be greater than zero"));
        }
        if let Some(ldap) = &self.ldap {
            ldap.validate()?;
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
