//! Typed schemas for measurement-CLI output
//!
//! Both the server list and the trial result are decoded into explicit
//! structs; any deviation from the expected shape is a decode failure that
//! feeds the retry/fallback policy instead of best-effort text scraping.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Bytes per second in one Mbit/s.
const BYTES_PER_MBIT: f64 = 125_000.0;

/// Latency statistics reported by a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingStats {
    pub latency: f64,
    #[serde(default)]
    pub jitter: Option<f64>,
}

/// One transfer direction of a trial, bandwidth in bytes per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub bandwidth: u64,
}

impl Transfer {
    /// Throughput in Mbit/s.
    pub fn mbps(&self) -> f64 {
        self.bandwidth as f64 / BYTES_PER_MBIT
    }
}

/// Server block inside a trial result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialServer {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Decoded output of one successful bandwidth trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub ping: PingStats,
    pub download: Transfer,
    pub upload: Transfer,
    #[serde(rename = "packetLoss", default)]
    pub packet_loss: Option<f64>,
    #[serde(default)]
    pub isp: Option<String>,
    pub server: TrialServer,
}

impl TrialReport {
    /// Decode a trial result from raw CLI stdout.
    pub fn decode(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::decode("trial produced empty output"));
        }
        serde_json::from_str(trimmed)
            .map_err(|e| AppError::decode(format!("malformed trial output: {e}")))
    }
}

/// One entry of the discovery server list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Decoded output of the measurement CLI's server-list mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerList {
    pub servers: Vec<ServerEntry>,
}

impl ServerList {
    /// Decode a server list from raw CLI stdout. An empty list is a decode
    /// failure: discovery must fall back rather than hand the trial runner
    /// nothing to try.
    pub fn decode(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::decode("server list output was empty"));
        }
        let list: ServerList = serde_json::from_str(trimmed)
            .map_err(|e| AppError::decode(format!("malformed server list: {e}")))?;
        if list.servers.is_empty() {
            return Err(AppError::decode("server list contained no servers"));
        }
        Ok(list)
    }

    /// Ranked server ids, best first, truncated to `max`.
    pub fn ranked_ids(&self, max: usize) -> Vec<u64> {
        self.servers.iter().take(max).map(|s| s.id).collect()
    }
}

#[cfg(test)]
pub mod tests_fixture {
    /// A representative trial result as emitted by the measurement CLI.
    pub const RESULT_JSON: &str = r#"{
        "type": "result",
        "timestamp": "2025-06-01T12:30:45Z",
        "ping": { "jitter": 1.25, "latency": 14.8 },
        "download": { "bandwidth": 12500000, "bytes": 160000000, "elapsed": 12802 },
        "upload": { "bandwidth": 2500000, "bytes": 32000000, "elapsed": 12800 },
        "packetLoss": 0.5,
        "isp": "Example Fiber, Inc.",
        "server": { "id": 4242, "name": "Example City Exchange", "location": "Example City" },
        "result": { "id": "0aa6e1c4", "persisted": true }
    }"#;

    pub const SERVER_LIST_JSON: &str = r#"{
        "type": "serverList",
        "servers": [
            { "id": 11, "name": "Alpha Networks", "location": "Alpha", "country": "AA" },
            { "id": 22, "name": "Beta Broadband", "location": "Beta", "country": "BB" },
            { "id": 33, "name": "Gamma Telecom", "location": "Gamma", "country": "CC" }
        ]
    }"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_trial_report() {
        let report = TrialReport::decode(tests_fixture::RESULT_JSON).expect("decode");
        assert_eq!(report.server.id, 4242);
        assert_eq!(report.ping.latency, 14.8);
        assert_eq!(report.packet_loss, Some(0.5));
        assert_eq!(report.download.mbps(), 100.0);
        assert_eq!(report.upload.mbps(), 20.0);
    }

    #[test]
    fn trial_report_tolerates_missing_optional_fields() {
        let raw = r#"{
            "ping": { "latency": 9.1 },
            "download": { "bandwidth": 125000 },
            "upload": { "bandwidth": 125000 },
            "server": { "id": 7, "name": "Tiny" }
        }"#;
        let report = TrialReport::decode(raw).expect("decode");
        assert_eq!(report.ping.jitter, None);
        assert_eq!(report.packet_loss, None);
        assert_eq!(report.isp, None);
    }

    #[test]
    fn empty_trial_output_is_a_decode_error() {
        let err = TrialReport::decode("   \n").unwrap_err();
        assert_eq!(err.category(), "DECODE");
    }

    #[test]
    fn malformed_trial_output_is_a_decode_error() {
        let err = TrialReport::decode("FULL SEND {not json").unwrap_err();
        assert_eq!(err.category(), "DECODE");
    }

    #[test]
    fn missing_required_field_is_a_decode_error() {
        // No download block: must fail, not default.
        let raw = r#"{
            "ping": { "latency": 9.1 },
            "upload": { "bandwidth": 125000 },
            "server": { "id": 7, "name": "Tiny" }
        }"#;
        assert!(TrialReport::decode(raw).is_err());
    }

    #[test]
    fn server_list_preserves_ranking_order() {
        let list = ServerList::decode(tests_fixture::SERVER_LIST_JSON).expect("decode");
        assert_eq!(list.ranked_ids(12), vec![11, 22, 33]);
        assert_eq!(list.ranked_ids(2), vec![11, 22]);
    }

    #[test]
    fn empty_server_list_is_a_decode_error() {
        let err = ServerList::decode(r#"{"servers": []}"#).unwrap_err();
        assert_eq!(err.category(), "DECODE");
    }
}
