//! Candidate measurement-server discovery
//!
//! Asks the measurement CLI for the ranked list of nearby servers and keeps
//! the first `max_servers` identifiers in reported order. Any failure along
//! the way (spawn error, non-zero exit, timeout, malformed or empty output)
//! degrades to the static fallback list, with a note in the error journal.
//! Discovery never fails the invocation.

use chrono::Local;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::models::ServerList;
use crate::process::run_with_timeout;
use crate::store::ErrorJournal;

/// Where the candidate list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    Live,
    StaticFallback,
}

/// Outcome of server discovery: an ordered, non-empty candidate list.
#[derive(Debug, Clone)]
pub struct DiscoveredServers {
    pub ids: Vec<u64>,
    pub source: DiscoverySource,
}

/// Discover candidate servers, falling back to the configured static list.
pub async fn discover(config: &Config, journal: &ErrorJournal, run_id: Uuid) -> DiscoveredServers {
    match query_live(config).await {
        Ok(ids) => {
            tracing::info!(count = ids.len(), "server discovery succeeded");
            DiscoveredServers {
                ids,
                source: DiscoverySource::Live,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "server discovery failed; using static list");
            let entry = crate::models::JournalEntry::discovery_failed(
                Local::now(),
                run_id,
                &e.to_string(),
            );
            if let Err(journal_err) = journal.append(&entry) {
                tracing::error!(error = %journal_err, "failed to journal discovery fallback");
            }
            DiscoveredServers {
                ids: config.static_servers.clone(),
                source: DiscoverySource::StaticFallback,
            }
        }
    }
}

async fn query_live(config: &Config) -> Result<Vec<u64>> {
    let args = vec!["--servers".to_string(), "--format=json".to_string()];
    let output = run_with_timeout(&config.measure_bin, &args, config.attempt_timeout()).await?;
    let list = ServerList::decode(&output.stdout)?;
    Ok(list.ranked_ids(config.max_servers))
}
