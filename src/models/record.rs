//! Measurement record data model and CSV rendering
//!
//! One [`MeasurementRecord`] is appended to the record store per invocation,
//! success or failure alike. Unknown values render as empty fields so the
//! column layout never shifts; free text is comma-escaped before write.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::truncate_error_text;
use crate::models::trial::TrialReport;

/// Maximum length of the error column, applied after comma escaping.
pub const ERROR_TEXT_MAX: usize = 200;

/// CSV header, written once per store file.
pub const CSV_HEADER: &str = "timestamp,download_mbps,upload_mbps,ping_ms,jitter_ms,packet_loss,\
server_name,server_id,isp,gw_ping_ms,gw_loss_pct,cf_ping_ms,cf_loss_pct,\
g_ping_ms,g_loss_pct,dns_ms,http_ms,wifi_iface,wifi_ssid,wifi_band,status,error";

/// Number of columns in the record store.
pub const CSV_FIELD_COUNT: usize = 22;

/// Outcome of an invocation as recorded in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Ok,
    Fail,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Fail => "fail",
        }
    }
}

/// One ICMP probe outcome: average round trip and loss percentage.
///
/// Loss is always present; 100.0 means no replies at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingSample {
    pub avg_ms: Option<f64>,
    pub loss_pct: f64,
}

impl PingSample {
    /// The sample recorded when the probe itself could not run.
    pub fn lost() -> Self {
        Self {
            avg_ms: None,
            loss_pct: 100.0,
        }
    }
}

/// Wireless context detected for the active interface. All best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiContext {
    pub iface: Option<String>,
    pub ssid: Option<String>,
    pub band: Option<String>,
}

/// Results of the auxiliary probe pass, attached to every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub gateway: PingSample,
    pub public_host_1: PingSample,
    pub public_host_2: PingSample,
    pub dns_ms: Option<u64>,
    pub http_ms: Option<u64>,
    pub wifi: WifiContext,
}

impl ProbeReport {
    /// A report with every field degraded to unknown.
    pub fn unknown() -> Self {
        Self {
            gateway: PingSample::lost(),
            public_host_1: PingSample::lost(),
            public_host_2: PingSample::lost(),
            dns_ms: None,
            http_ms: None,
            wifi: WifiContext::default(),
        }
    }
}

/// One row of the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Local>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub ping_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss: Option<f64>,
    pub server_name: Option<String>,
    pub server_id: Option<u64>,
    pub isp: Option<String>,
    pub probes: ProbeReport,
    pub status: RunStatus,
    pub error: Option<String>,
}

impl MeasurementRecord {
    /// Record for a successful invocation, throughput taken from the decoded
    /// trial report (byte-rate ÷ 125000 → Mbit/s).
    pub fn success(timestamp: DateTime<Local>, report: &TrialReport, probes: ProbeReport) -> Self {
        Self {
            timestamp,
            download_mbps: Some(report.download.mbps()),
            upload_mbps: Some(report.upload.mbps()),
            ping_ms: Some(report.ping.latency),
            jitter_ms: report.ping.jitter,
            packet_loss: report.packet_loss,
            server_name: Some(report.server.name.clone()),
            server_id: Some(report.server.id),
            isp: report.isp.clone(),
            probes,
            status: RunStatus::Ok,
            error: None,
        }
    }

    /// Record for a failed invocation, carrying the capped last error text.
    pub fn failure(timestamp: DateTime<Local>, probes: ProbeReport, error: &str) -> Self {
        Self {
            timestamp,
            download_mbps: None,
            upload_mbps: None,
            ping_ms: None,
            jitter_ms: None,
            packet_loss: None,
            server_name: None,
            server_id: None,
            isp: None,
            probes,
            status: RunStatus::Fail,
            error: Some(truncate_error_text(error, ERROR_TEXT_MAX)),
        }
    }

    /// Key for the raw payload file belonging to this record.
    pub fn payload_key(&self) -> String {
        format!("speedtest-{}.json", self.timestamp.format("%Y%m%d-%H%M%S"))
    }

    /// Render the record as one CSV row (no trailing newline).
    pub fn to_csv_row(&self) -> String {
        let columns = [
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            fmt_f64(self.download_mbps, 2),
            fmt_f64(self.upload_mbps, 2),
            fmt_f64(self.ping_ms, 2),
            fmt_f64(self.jitter_ms, 2),
            fmt_f64(self.packet_loss, 1),
            escape_field(self.server_name.as_deref().unwrap_or("")),
            self.server_id.map(|id| id.to_string()).unwrap_or_default(),
            escape_field(self.isp.as_deref().unwrap_or("")),
            fmt_f64(self.probes.gateway.avg_ms, 1),
            format!("{:.1}", self.probes.gateway.loss_pct),
            fmt_f64(self.probes.public_host_1.avg_ms, 1),
            format!("{:.1}", self.probes.public_host_1.loss_pct),
            fmt_f64(self.probes.public_host_2.avg_ms, 1),
            format!("{:.1}", self.probes.public_host_2.loss_pct),
            self.probes.dns_ms.map(|v| v.to_string()).unwrap_or_default(),
            self.probes.http_ms.map(|v| v.to_string()).unwrap_or_default(),
            escape_field(self.probes.wifi.iface.as_deref().unwrap_or("")),
            escape_field(self.probes.wifi.ssid.as_deref().unwrap_or("")),
            escape_field(self.probes.wifi.band.as_deref().unwrap_or("")),
            self.status.as_str().to_string(),
            escape_field(self.error.as_deref().unwrap_or("")),
        ];
        columns.join(",")
    }
}

/// Replace embedded commas with semicolons so free text cannot shift the
/// column layout. Newlines collapse to spaces for the same reason.
pub fn escape_field(value: &str) -> String {
    value.replace(',', ";").replace(['\n', '\r'], " ")
}

fn fmt_f64(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_default()
}
