//! Run coordination: one end-to-end measurement invocation
//!
//! Drives a single invocation through its states: acquire the exclusivity
//! lock (or exit quietly if another invocation holds it), check the
//! environment, run the auxiliary probes, discover candidate servers, drive
//! the bandwidth trial runner, and append exactly one record. Probe results
//! are attached to the record regardless of the trial outcome, so even a
//! fully failed invocation yields reachability data.

use chrono::Local;
use uuid::Uuid;

use crate::config::Config;
use crate::discovery;
use crate::error::{AppError, Result};
use crate::lock::RunLock;
use crate::models::{JournalEntry, MeasurementRecord};
use crate::probe;
use crate::process::command_exists;
use crate::store::{ErrorJournal, RecordStore};
use crate::trial::{self, SpeedtestCli, TrialPolicy};

/// Fixed diagnostic recorded when the measurement binary is absent.
pub const MEASURE_BIN_MISSING_ERROR: &str = "speedtest binary not found on PATH";

/// How an invocation ended on its success path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A record was appended (status `ok`).
    Recorded,
    /// Another invocation holds the lock; nothing was written.
    SkippedLockBusy,
}

/// Coordinates one invocation.
pub struct App {
    config: Config,
    run_id: Uuid,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4(),
        }
    }

    /// Execute one invocation end to end.
    ///
    /// Exactly one MeasurementRecord is appended unless the lock was busy.
    /// Failures that produced a `fail` record still return the error so the
    /// process exit code reflects the outcome.
    pub async fn run(self) -> Result<RunOutcome> {
        let lock_path = self.config.lock_path();
        let Some(_lock) = RunLock::try_acquire(&lock_path)? else {
            tracing::info!(
                lock = %lock_path.display(),
                "another invocation is in progress; skipping this run"
            );
            return Ok(RunOutcome::SkippedLockBusy);
        };
        tracing::info!(run_id = %self.run_id, "invocation started");

        let store = RecordStore::new(&self.config);
        let journal = ErrorJournal::new(self.config.journal_path());

        // Environment precheck: without the measurement binary there is
        // nothing to discover or trial, but the failure still gets recorded.
        if !command_exists(&self.config.measure_bin) {
            let entry = JournalEntry::precheck_failed(
                Local::now(),
                self.run_id,
                "MEASURE_BIN_MISSING",
                &format!("`{}` not found on PATH", self.config.measure_bin),
            );
            if let Err(e) = journal.append(&entry) {
                tracing::error!(error = %e, "failed to journal precheck failure");
            }
            let record = MeasurementRecord::failure(
                Local::now(),
                crate::models::ProbeReport::unknown(),
                MEASURE_BIN_MISSING_ERROR,
            );
            store.append(&record)?;
            return Err(AppError::CommandMissing {
                command: self.config.measure_bin.clone(),
            });
        }

        let probes = probe::collect(&self.config).await;

        let discovered = discovery::discover(&self.config, &journal, self.run_id).await;
        tracing::info!(
            candidates = discovered.ids.len(),
            source = ?discovered.source,
            "candidate servers ready"
        );

        let executor = SpeedtestCli::new(&self.config.measure_bin);
        let policy = TrialPolicy::from_config(&self.config);
        let timestamp = Local::now();

        match trial::run_trials(&executor, &policy, &discovered.ids, &journal, self.run_id).await {
            Ok(success) => {
                let record = MeasurementRecord::success(timestamp, &success.report, probes);
                store.append(&record)?;
                store.write_raw_payload(&record.payload_key(), &success.raw_payload)?;
                tracing::info!(
                    server_id = success.report.server.id,
                    attempts = success.attempts_used,
                    download_mbps = success.report.download.mbps(),
                    "record written"
                );
                Ok(RunOutcome::Recorded)
            }
            Err(e @ AppError::Exhausted { .. }) => {
                let record = MeasurementRecord::failure(timestamp, probes, &e.to_string());
                store.append(&record)?;
                tracing::warn!(error = %e, "invocation failed; fail record written");
                Err(e)
            }
            Err(e) => {
                // Unexpected trial-runner error (store/journal I/O). Still
                // honor the one-record-per-invocation invariant.
                let record = MeasurementRecord::failure(timestamp, probes, &e.to_string());
                store.append(&record)?;
                Err(e)
            }
        }
    }
}
