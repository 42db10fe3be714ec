//! Bandwidth trial runner
//!
//! Drives bandwidth trials across the ordered candidate list: up to N
//! attempts per server, each time-bounded, linear backoff between attempts
//! on the same server, and a global attempt cap bounding the whole
//! invocation. An attempt succeeds only when the process exits cleanly AND
//! its output decodes as a well-formed trial report; everything else is a
//! journaled failure. First success short-circuits; spending the cap or the
//! candidate list signals exhaustion.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{JournalEntry, TrialReport};
use crate::process::run_with_timeout;
use crate::store::ErrorJournal;

/// Seam between the retry loop and the actual measurement process, so tests
/// can script failure sequences.
#[async_trait]
pub trait TrialExecutor {
    /// Run one bandwidth trial against `server_id` and return raw stdout on
    /// a clean exit.
    async fn run_trial(&self, server_id: u64, timeout: Duration) -> Result<String>;
}

/// Executor backed by the measurement CLI on PATH.
pub struct SpeedtestCli {
    bin: String,
}

impl SpeedtestCli {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }
}

#[async_trait]
impl TrialExecutor for SpeedtestCli {
    async fn run_trial(&self, server_id: u64, timeout: Duration) -> Result<String> {
        let args = vec![
            "--server-id".to_string(),
            server_id.to_string(),
            "--format=json".to_string(),
        ];
        let output = run_with_timeout(&self.bin, &args, timeout).await?;
        Ok(output.stdout)
    }
}

/// Retry policy knobs, copied out of the configuration.
#[derive(Debug, Clone, Copy)]
pub struct TrialPolicy {
    pub attempts_per_server: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub max_total_attempts: u32,
}

impl TrialPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts_per_server: config.attempts_per_server,
            attempt_timeout: config.attempt_timeout(),
            backoff_base: config.backoff_base(),
            max_total_attempts: config.max_total_attempts,
        }
    }
}

/// Explicit retry-loop state. The global-cap termination condition is a
/// single comparison on `total_attempts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptState {
    pub server_index: usize,
    pub attempt: u32,
    pub total_attempts: u32,
}

impl AttemptState {
    fn cap_reached(&self, policy: &TrialPolicy) -> bool {
        self.total_attempts >= policy.max_total_attempts
    }
}

/// A decoded, successful trial plus its verbatim payload.
#[derive(Debug, Clone)]
pub struct TrialSuccess {
    pub report: TrialReport,
    pub raw_payload: String,
    pub attempts_used: u32,
}

/// Backoff delay after failed attempt `attempt` on a server.
///
/// Grows linearly: attempt 1 → base, attempt 2 → 2×base, …
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base * attempt
}

/// Run trials across `servers` until the first success or exhaustion.
pub async fn run_trials<E: TrialExecutor>(
    executor: &E,
    policy: &TrialPolicy,
    servers: &[u64],
    journal: &ErrorJournal,
    run_id: Uuid,
) -> Result<TrialSuccess> {
    let mut state = AttemptState::default();
    let mut last_error = String::from("no candidate servers");

    'servers: for (server_index, &server_id) in servers.iter().enumerate() {
        state.server_index = server_index;

        for attempt in 1..=policy.attempts_per_server {
            if state.cap_reached(policy) {
                tracing::warn!(
                    total_attempts = state.total_attempts,
                    "global attempt cap reached"
                );
                break 'servers;
            }

            if attempt > 1 {
                let delay = backoff_delay(attempt - 1, policy.backoff_base);
                tracing::debug!(server_id, attempt, delay_secs = delay.as_secs(), "backing off");
                tokio::time::sleep(delay).await;
            }

            state.attempt = attempt;
            state.total_attempts += 1;
            tracing::info!(
                server_id,
                attempt,
                total_attempts = state.total_attempts,
                "starting bandwidth trial"
            );

            match attempt_once(executor, policy, server_id).await {
                Ok((report, raw_payload)) => {
                    tracing::info!(
                        server_id,
                        attempts_used = state.total_attempts,
                        "bandwidth trial succeeded"
                    );
                    return Ok(TrialSuccess {
                        report,
                        raw_payload,
                        attempts_used: state.total_attempts,
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    let entry = JournalEntry::trial_attempt_failed(
                        Local::now(),
                        run_id,
                        server_id,
                        attempt,
                        e.command_status(),
                        &last_error,
                    );
                    if let Err(journal_err) = journal.append(&entry) {
                        tracing::error!(error = %journal_err, "failed to journal trial attempt");
                    }
                }
            }
        }
    }

    Err(AppError::Exhausted {
        attempts: state.total_attempts,
        last_error,
    })
}

async fn attempt_once<E: TrialExecutor>(
    executor: &E,
    policy: &TrialPolicy,
    server_id: u64,
) -> Result<(TrialReport, String)> {
    let raw = executor.run_trial(server_id, policy.attempt_timeout).await?;
    let report = TrialReport::decode(&raw)?;
    Ok((report, raw))
}
