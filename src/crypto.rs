//! Password hashing and verification.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::{Argon2 as ArgonConfig, LegacyEncoding};
use crate::error::CryptoError;

type Result<T> = std::result::Result<T, CryptoError>;

/// How a stored credential matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verified {
    /// Argon2 PHC string.
    Hash,
    /// Legacy encoding; the record should be rehashed.
    Legacy,
}

/// Argon2id password manager.
#[derive(Clone)]
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a stored credential.
    ///
    /// PHC strings are always accepted. Other values are only compared when
    /// `legacy` allows it.
    pub fn verify(
        &self,
        password: &str,
        stored: &str,
        legacy: LegacyEncoding,
    ) -> Result<Verified> {
        if let Ok(parsed) = PasswordHash::new(stored) {
            return self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .map(|_| Verified::Hash)
                .map_err(|_| CryptoError::Mismatch);
        }

        match legacy {
            LegacyEncoding::Base64 => {
                let encoded = Zeroizing::new(STANDARD.encode(password));
                if ct_eq(encoded.as_bytes(), stored.as_bytes()) {
                    Ok(Verified::Legacy)
                } else {
                    Err(CryptoError::Mismatch)
                }
            },
            LegacyEncoding::None => Err(CryptoError::Mismatch),
        }
    }
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).into()
}

#[cfg(test)]
pub(crate) fn fast_manager() -> PasswordManager {
    PasswordManager::new(Some(ArgonConfig {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }))
    .expect("valid argon2 parameters")
}
