//! Configuration management module

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the record store, raw payloads, journal, and lock
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Wireless interface hint for context detection
    #[serde(default)]
    pub iface: Option<String>,

    /// Gateway address override; autodetected from the routing table if unset
    #[serde(default)]
    pub gateway: Option<String>,

    /// First public ping target (cf_* record columns)
    #[serde(default = "default_public_host_1")]
    pub public_host_1: String,

    /// Second public ping target (g_* record columns)
    #[serde(default = "default_public_host_2")]
    pub public_host_2: String,

    /// Echo requests per ping probe
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Per-probe time budget in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_seconds: u64,

    /// Hostname resolved by the DNS probe
    #[serde(default = "default_dns_probe_host")]
    pub dns_probe_host: String,

    /// Resolver address queried by the DNS probe
    #[serde(default = "default_dns_resolver")]
    pub dns_resolver: String,

    /// URL fetched by the HTTP probe
    #[serde(default = "default_http_probe_url")]
    pub http_probe_url: String,

    /// Name of the measurement CLI on PATH
    #[serde(default = "default_measure_bin")]
    pub measure_bin: String,

    /// Maximum number of discovered servers to keep
    #[serde(default = "default_max_servers")]
    pub max_servers: usize,

    /// Static fallback server identifiers, fixed order
    #[serde(default = "default_static_servers")]
    pub static_servers: Vec<u64>,

    /// Bandwidth trial attempts per server
    #[serde(default = "default_attempts_per_server")]
    pub attempts_per_server: u32,

    /// Per-attempt time budget in seconds
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_seconds: u64,

    /// Base backoff delay between attempts in seconds
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_seconds: u64,

    /// Global cap on trial attempts across all servers
    #[serde(default = "default_max_total_attempts")]
    pub max_total_attempts: u32,

    /// Advisory cadence for the external scheduler, minutes. Not consumed
    /// by the invocation itself.
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            iface: None,
            gateway: None,
            public_host_1: default_public_host_1(),
            public_host_2: default_public_host_2(),
            ping_count: default_ping_count(),
            probe_timeout_seconds: default_probe_timeout_secs(),
            dns_probe_host: default_dns_probe_host(),
            dns_resolver: default_dns_resolver(),
            http_probe_url: default_http_probe_url(),
            measure_bin: default_measure_bin(),
            max_servers: default_max_servers(),
            static_servers: default_static_servers(),
            attempts_per_server: default_attempts_per_server(),
            attempt_timeout_seconds: default_attempt_timeout_secs(),
            backoff_base_seconds: default_backoff_base_secs(),
            max_total_attempts: default_max_total_attempts(),
            refresh_interval_minutes: default_refresh_interval_minutes(),
        }
    }
}

impl Config {
    /// Path of the append-only CSV record store
    pub fn csv_path(&self) -> PathBuf {
        self.data_dir.join("speedtest.csv")
    }

    /// Path of the JSON-lines error journal
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("journal.log")
    }

    /// Directory holding raw trial payloads
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Path of the invocation lock file
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("run.lock")
    }

    /// Per-probe time budget as a Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Per-attempt time budget as a Duration
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }

    /// Base backoff delay as a Duration
    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_seconds)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.measure_bin.trim().is_empty() {
            return Err(AppError::config("Measurement binary name cannot be empty"));
        }

        if self.ping_count == 0 || self.ping_count > 20 {
            return Err(AppError::config("Ping count must be between 1 and 20"));
        }

        if self.probe_timeout_seconds == 0 || self.probe_timeout_seconds > 60 {
            return Err(AppError::config(
                "Probe timeout must be between 1 and 60 seconds",
            ));
        }

        if self.attempt_timeout_seconds == 0 || self.attempt_timeout_seconds > 600 {
            return Err(AppError::config(
                "Attempt timeout must be between 1 and 600 seconds",
            ));
        }

        if self.attempts_per_server == 0 {
            return Err(AppError::config("Attempts per server must be greater than 0"));
        }

        if self.max_total_attempts == 0 {
            return Err(AppError::config("Global attempt cap must be greater than 0"));
        }

        if self.max_servers == 0 {
            return Err(AppError::config("Max servers must be greater than 0"));
        }

        if self.static_servers.is_empty() {
            return Err(AppError::config("Static fallback server list cannot be empty"));
        }

        if IpAddr::from_str(&self.dns_resolver).is_err() {
            return Err(AppError::config(format!(
                "Invalid DNS resolver address: {}",
                self.dns_resolver
            )));
        }

        if let Some(gateway) = &self.gateway {
            if IpAddr::from_str(gateway).is_err() {
                return Err(AppError::config(format!(
                    "Invalid gateway address: {gateway}"
                )));
            }
        }

        match url::Url::parse(&self.http_probe_url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!(
                        "HTTP probe URL must use http or https: {}",
                        self.http_probe_url
                    )));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!(
                    "Invalid HTTP probe URL '{}': {}",
                    self.http_probe_url, e
                )));
            }
        }

        Ok(())
    }
}

/// Build the effective configuration: defaults, then CLI flags (each flag is
/// also backed by an `NHL_*` environment variable via clap).
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::default();
    cli.apply_to(&mut config)?;
    config.validate()?;
    Ok(config)
}

// Default value functions for serde

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/network-health-logger")
}

fn default_public_host_1() -> String {
    "1.1.1.1".to_string()
}

fn default_public_host_2() -> String {
    "8.8.8.8".to_string()
}

fn default_ping_count() -> u32 {
    crate::defaults::DEFAULT_PING_COUNT
}

fn default_probe_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_PROBE_TIMEOUT.as_secs()
}

fn default_dns_probe_host() -> String {
    "www.google.com".to_string()
}

fn default_dns_resolver() -> String {
    "1.1.1.1".to_string()
}

fn default_http_probe_url() -> String {
    "https://www.google.com/generate_204".to_string()
}

fn default_measure_bin() -> String {
    crate::defaults::DEFAULT_MEASURE_BIN.to_string()
}

fn default_max_servers() -> usize {
    crate::defaults::DEFAULT_MAX_SERVERS
}

fn default_static_servers() -> Vec<u64> {
    crate::defaults::DEFAULT_STATIC_SERVERS.to_vec()
}

fn default_attempts_per_server() -> u32 {
    crate::defaults::DEFAULT_ATTEMPTS_PER_SERVER
}

fn default_attempt_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_ATTEMPT_TIMEOUT.as_secs()
}

fn default_backoff_base_secs() -> u64 {
    crate::defaults::DEFAULT_BACKOFF_BASE.as_secs()
}

fn default_max_total_attempts() -> u32 {
    crate::defaults::DEFAULT_MAX_TOTAL_ATTEMPTS
}

fn default_refresh_interval_minutes() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_static_list_has_eleven_entries() {
        let config = Config::default();
        assert_eq!(config.static_servers.len(), 11);
    }

    #[test]
    fn store_paths_derive_from_data_dir() {
        let mut config = Config::default();
        config.data_dir = PathBuf::from("/tmp/nhl");
        assert_eq!(config.csv_path(), PathBuf::from("/tmp/nhl/speedtest.csv"));
        assert_eq!(config.journal_path(), PathBuf::from("/tmp/nhl/journal.log"));
        assert_eq!(config.raw_dir(), PathBuf::from("/tmp/nhl/raw"));
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/nhl/run.lock"));
    }

    #[test]
    fn zero_ping_count_invalid() {
        let mut config = Config::default();
        config.ping_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_resolver_address_rejected() {
        let mut config = Config::default();
        config.dns_resolver = "not-an-ip".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_gateway_rejected() {
        let mut config = Config::default();
        config.gateway = Some("10.0.0.999".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_probe_url_rejected() {
        let mut config = Config::default();
        config.http_probe_url = "ftp://example.com/file".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_static_list_rejected() {
        let mut config = Config::default();
        config.static_servers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_global_cap_rejected() {
        let mut config = Config::default();
        config.max_total_attempts = 0;
        assert!(config.validate().is_err());
    }
}
