//! Verification against the local user store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::checker::{CredentialChecker, within};
use crate::config::LegacyEncoding;
use crate::crypto::{PasswordManager, Verified};
use crate::error::{InfrastructureError, Phase, StoreError};
use crate::outcome::{Credentials, Denial, Outcome};
use crate::user::UserStore;

const NAME: &str = "local";

/// Local store credential checker.
pub struct LocalChecker {
    store: Arc<dyn UserStore>,
    pwd: PasswordManager,
    legacy: LegacyEncoding,
}

impl LocalChecker {
    /// Create a new [`LocalChecker`].
    pub fn new(
        store: Arc<dyn UserStore>,
        pwd: PasswordManager,
        legacy: LegacyEncoding,
    ) -> Self {
        Self { store, pwd, legacy }
    }
}

#[async_trait]
impl CredentialChecker for LocalChecker {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn check(
        &self,
        credentials: &Credentials<'_>,
        deadline: Instant,
    ) -> Outcome {
        if credentials.is_blank() {
            return Outcome::Denied(Denial::InvalidInput);
        }

        let records = match within(
            deadline,
            Phase::Lookup,
            self.store.find_active(credentials.username),
        )
        .await
        {
            Ok(records) => records,
            Err(err) => return err.into(),
        };

        let user = match records.as_slice() {
            [] => return Outcome::Denied(Denial::NotFound),
            [user] => user,
            many => {
                return InfrastructureError::new(
                    Phase::Lookup,
                    StoreError::AmbiguousUser { count: many.len() },
                )
                .into();
            },
        };

        // Blocked accounts are refused before looking at the password.
        if user.blocked {
            return Outcome::Denied(Denial::Blocked);
        }

        match self.pwd.verify(credentials.password, &user.password, self.legacy) {
            Ok(Verified::Hash) => Outcome::Granted,
            Ok(Verified::Legacy) => {
                tracing::warn!(
                    username = credentials.username,
                    user_id = user.id,
                    "credential uses a legacy encoding and should be rehashed"
                );
                Outcome::Granted
            },
            Err(_) => Outcome::Denied(Denial::BadCredential),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crypto::fast_manager;
    use crate::testing::MemoryStore;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn checker(store: &MemoryStore, legacy: LegacyEncoding) -> LocalChecker {
        LocalChecker::new(Arc::new(store.clone()), fast_manager(), legacy)
    }

    #[tokio::test]
    async fn test_granted_with_argon2_hash() {
        let hash = fast_manager().hash_password("secret123").unwrap();
        let store = MemoryStore::new().user("alice", &hash, false);

        let outcome = checker(&store, LegacyEncoding::None)
            .check(&Credentials::new("alice", "secret123"), deadline())
            .await;

        assert!(outcome.is_granted());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let hash = fast_manager().hash_password("secret123").unwrap();
        let store = MemoryStore::new().user("alice", &hash, false);

        let outcome = checker(&store, LegacyEncoding::None)
            .check(&Credentials::new("alice", "secret124"), deadline())
            .await;

        assert_eq!(outcome.denial(), Some(Denial::BadCredential));
    }

    #[tokio::test]
    async fn test_not_found() {
        let store = MemoryStore::new();

        let outcome = checker(&store, LegacyEncoding::None)
            .check(&Credentials::new("nobody", "secret"), deadline())
            .await;

        assert_eq!(outcome.denial(), Some(Denial::NotFound));
    }

    #[tokio::test]
    async fn test_blocked_wins_over_correct_password() {
        let hash = fast_manager().hash_password("secret123").unwrap();
        let store = MemoryStore::new().user("alice", &hash, true);
        let checker = checker(&store, LegacyEncoding::None);

        for password in ["secret123", "wrong"] {
            let outcome = checker
                .check(&Credentials::new("alice", password), deadline())
                .await;
            assert_eq!(outcome.denial(), Some(Denial::Blocked));
        }
    }

    #[tokio::test]
    async fn test_legacy_base64_only_when_enabled() {
        // base64("secret123").
        let store = MemoryStore::new().user("alice", "c2VjcmV0MTIz", false);
        let credentials = Credentials::new("alice", "secret123");

        let outcome = checker(&store, LegacyEncoding::Base64)
            .check(&credentials, deadline())
            .await;
        assert!(outcome.is_granted());

        let outcome = checker(&store, LegacyEncoding::None)
            .check(&credentials, deadline())
            .await;
        assert_eq!(outcome.denial(), Some(Denial::BadCredential));
    }

    #[tokio::test]
    async fn test_duplicate_records_are_a_store_fault() {
        let store = MemoryStore::new()
            .user("alice", "c2VjcmV0MTIz", false)
            .user("alice", "c2VjcmV0MTIz", true);

        let outcome = checker(&store, LegacyEncoding::Base64)
            .check(&Credentials::new("alice", "secret123"), deadline())
            .await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.phase, Phase::Lookup);
        assert!(failure.to_string().contains("2 active records"));
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let store = MemoryStore::new().unavailable();

        let outcome = checker(&store, LegacyEncoding::None)
            .check(&Credentials::new("alice", "secret123"), deadline())
            .await;

        assert_eq!(outcome.failure().map(|e| e.phase), Some(Phase::Lookup));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_deadline() {
        let store = MemoryStore::new().stall(Duration::from_secs(60));
        let deadline = Instant::now() + Duration::from_secs(1);

        let outcome = checker(&store, LegacyEncoding::None)
            .check(&Credentials::new("alice", "secret123"), deadline)
            .await;

        assert_eq!(outcome.failure().map(|e| e.phase), Some(Phase::Lookup));
    }

    #[tokio::test]
    async fn test_blank_input_skips_store() {
        let store = MemoryStore::new();
        let checker = checker(&store, LegacyEncoding::None);

        let outcome = checker.check(&Credentials::new("", "secret"), deadline()).await;
        assert_eq!(outcome.denial(), Some(Denial::InvalidInput));
        assert_eq!(store.lookups(), 0);
    }
}
