//! Capability shared by every credential source.

use std::future::Future;

use async_trait::async_trait;
use tokio::time::{Instant, timeout_at};

use crate::error::{DeadlineExceeded, InfrastructureError, Phase};
use crate::outcome::{Credentials, Outcome};

/// A source able to say whether credentials are valid.
///
/// Implementations never fail: every error is folded into the returned
/// [`Outcome`].
#[async_trait]
pub trait CredentialChecker: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Check `credentials`, giving up once `deadline` is reached.
    async fn check(
        &self,
        credentials: &Credentials<'_>,
        deadline: Instant,
    ) -> Outcome;
}

/// Run `fut` until `deadline`, tagging any error with `phase`.
pub(crate) async fn within<T, E, F>(
    deadline: Instant,
    phase: Phase,
    fut: F,
) -> Result<T, InfrastructureError>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    // an already ready future would otherwise slip past a spent deadline.
    if Instant::now() >= deadline {
        return Err(InfrastructureError::new(phase, DeadlineExceeded));
    }

    match timeout_at(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(InfrastructureError::new(phase, err)),
        Err(_) => Err(InfrastructureError::new(phase, DeadlineExceeded)),
    }
}
