//! Telemetry logic.
//! Support logging and metrics.
use metrics::{Unit, counter};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::outcome::{Credentials, Denial, Outcome};

const DEFAULT_LOG_LEVEL: &str = "info";

pub const ATTEMPTS_TOTAL: &str = "authgate_attempts_total";
pub const FAILURES_TOTAL: &str = "authgate_infrastructure_failures_total";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
}

/// Describe counters to whichever recorder is installed.
///
/// Call it once the embedding process has installed its exporter.
pub fn describe_metrics() {
    metrics::describe_counter!(
        ATTEMPTS_TOTAL,
        Unit::Count,
        "Credential checks, by checker and outcome."
    );
    metrics::describe_counter!(
        FAILURES_TOTAL,
        Unit::Count,
        "Credential checks that could not reach a decision."
    );
}

/// Log and count the outcome of one checker.
///
/// Denials are regular traffic. Infrastructure failures are reported at
/// `error` and counted separately so they can raise alerts.
pub(crate) fn record(
    checker: &'static str,
    credentials: &Credentials<'_>,
    outcome: &Outcome,
) {
    let username = credentials.username;

    match outcome {
        Outcome::Granted => {
            tracing::info!(%username, checker, "credentials accepted")
        },
        Outcome::Denied(Denial::NotFound) => {
            tracing::info!(%username, checker, "unknown username")
        },
        Outcome::Denied(Denial::InvalidInput) => {
            tracing::info!(%username, checker, "empty username or password")
        },
        Outcome::Denied(Denial::Blocked) => {
            tracing::warn!(%username, checker, "user is blocked")
        },
        Outcome::Denied(Denial::BadCredential) => {
            tracing::warn!(%username, checker, "wrong password")
        },
        Outcome::Failed(err) => {
            tracing::error!(
                %username,
                checker,
                phase = %err.phase,
                error = %err.source,
                "credential source unavailable"
            );
            counter!(FAILURES_TOTAL, "checker" => checker, "phase" => err.phase.as_str())
                .increment(1);
        },
    }

    counter!(ATTEMPTS_TOTAL, "checker" => checker, "outcome" => outcome.label())
        .increment(1);
}
