//! Error journal entries
//!
//! One JSON line per failed attempt, discovery fallback, or precheck
//! failure. The journal is the durable, append-only companion to the record
//! store: the record says *that* an invocation failed, the journal says why,
//! attempt by attempt.

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::truncate_error_text;

/// Maximum length of the free-text detail field in a journal line.
pub const DETAIL_TEXT_MAX: usize = 500;

/// Which stage of the invocation produced the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalPhase {
    Precheck,
    Discovery,
    Trial,
}

/// One line of the error journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: String,
    pub run_id: Uuid,
    pub level: String,
    pub phase: JournalPhase,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JournalEntry {
    fn base(
        ts: DateTime<Local>,
        run_id: Uuid,
        phase: JournalPhase,
        reason: &str,
        detail: Option<&str>,
    ) -> Self {
        Self {
            ts: ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            run_id,
            level: "ERROR".to_string(),
            phase,
            reason: reason.to_string(),
            server_id: None,
            attempt: None,
            status: None,
            detail: detail.map(|d| truncate_error_text(d, DETAIL_TEXT_MAX)),
        }
    }

    /// Entry for a failed environment precheck (fatal for the invocation).
    pub fn precheck_failed(ts: DateTime<Local>, run_id: Uuid, reason: &str, detail: &str) -> Self {
        Self::base(ts, run_id, JournalPhase::Precheck, reason, Some(detail))
    }

    /// Entry for a discovery fallback to the static server list.
    pub fn discovery_failed(ts: DateTime<Local>, run_id: Uuid, detail: &str) -> Self {
        Self::base(
            ts,
            run_id,
            JournalPhase::Discovery,
            "DISCOVERY_FAILED",
            Some(detail),
        )
    }

    /// Entry for one failed bandwidth-trial attempt.
    pub fn trial_attempt_failed(
        ts: DateTime<Local>,
        run_id: Uuid,
        server_id: u64,
        attempt: u32,
        status: Option<i32>,
        detail: &str,
    ) -> Self {
        let mut entry = Self::base(ts, run_id, JournalPhase::Trial, "TRIAL_FAILED", Some(detail));
        entry.server_id = Some(server_id);
        entry.attempt = Some(attempt);
        entry.status = status;
        entry
    }

    /// Serialize to the single JSON line appended to the journal.
    pub fn to_json_line(&self) -> String {
        // Serialization of this struct cannot fail; fall back to a plain
        // line rather than lose the event if it ever does.
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"ts\":\"{}\",\"reason\":\"{}\"}}", self.ts, self.reason))
    }
}
