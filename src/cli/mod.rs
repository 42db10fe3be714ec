//! Command-line interface module
//!
//! Every flag is backed by an `NHL_*` environment variable so the external
//! scheduler can configure the invocation without touching its unit file
//! arguments. A `.env` file is honored via dotenv at startup.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Network Health Logger - measure bandwidth, latency, DNS, and HTTP health once and record the outcome
#[derive(Parser, Debug, Clone)]
#[command(name = "network-health-logger")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory for the record store, raw payloads, journal, and lock file
    #[arg(long, env = "NHL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Wireless interface hint for context detection
    #[arg(long, env = "NHL_IFACE")]
    pub iface: Option<String>,

    /// Gateway address override (autodetected from the routing table if omitted)
    #[arg(long, env = "NHL_GATEWAY")]
    pub gateway: Option<String>,

    /// First public ping target
    #[arg(long, env = "NHL_PUBLIC_HOST_1")]
    pub public_host_1: Option<String>,

    /// Second public ping target
    #[arg(long, env = "NHL_PUBLIC_HOST_2")]
    pub public_host_2: Option<String>,

    /// Echo requests per ping probe
    #[arg(long, env = "NHL_PING_COUNT")]
    pub ping_count: Option<u32>,

    /// Per-probe time budget in seconds
    #[arg(long, env = "NHL_PROBE_TIMEOUT")]
    pub probe_timeout: Option<u64>,

    /// Hostname resolved by the DNS probe
    #[arg(long, env = "NHL_DNS_HOST")]
    pub dns_host: Option<String>,

    /// Resolver IP queried by the DNS probe
    #[arg(long, env = "NHL_DNS_RESOLVER")]
    pub dns_resolver: Option<String>,

    /// URL fetched by the HTTP probe
    #[arg(long, env = "NHL_HTTP_URL")]
    pub http_url: Option<String>,

    /// Name of the measurement CLI on PATH
    #[arg(long, env = "NHL_MEASURE_BIN")]
    pub measure_bin: Option<String>,

    /// Maximum number of discovered servers to keep
    #[arg(long, env = "NHL_MAX_SERVERS")]
    pub max_servers: Option<usize>,

    /// Static fallback server ids (comma-separated)
    #[arg(long, env = "NHL_STATIC_SERVERS")]
    pub static_servers: Option<String>,

    /// Bandwidth trial attempts per server
    #[arg(long, env = "NHL_ATTEMPTS_PER_SERVER")]
    pub attempts_per_server: Option<u32>,

    /// Per-attempt time budget in seconds
    #[arg(long, env = "NHL_ATTEMPT_TIMEOUT")]
    pub attempt_timeout: Option<u64>,

    /// Base backoff delay between attempts in seconds
    #[arg(long, env = "NHL_BACKOFF_BASE")]
    pub backoff_base: Option<u64>,

    /// Global cap on trial attempts across all servers
    #[arg(long, env = "NHL_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Advisory scheduler cadence in minutes (recorded, not enforced)
    #[arg(long, env = "NHL_REFRESH_INTERVAL")]
    pub refresh_interval: Option<u64>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Overlay the provided flags onto `config`.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if self.iface.is_some() {
            config.iface = self.iface.clone();
        }
        if self.gateway.is_some() {
            config.gateway = self.gateway.clone();
        }
        if let Some(host) = &self.public_host_1 {
            config.public_host_1 = host.clone();
        }
        if let Some(host) = &self.public_host_2 {
            config.public_host_2 = host.clone();
        }
        if let Some(count) = self.ping_count {
            config.ping_count = count;
        }
        if let Some(secs) = self.probe_timeout {
            config.probe_timeout_seconds = secs;
        }
        if let Some(host) = &self.dns_host {
            config.dns_probe_host = host.clone();
        }
        if let Some(resolver) = &self.dns_resolver {
            config.dns_resolver = resolver.clone();
        }
        if let Some(url) = &self.http_url {
            config.http_probe_url = url.clone();
        }
        if let Some(bin) = &self.measure_bin {
            config.measure_bin = bin.clone();
        }
        if let Some(max) = self.max_servers {
            config.max_servers = max;
        }
        if let Some(list) = &self.static_servers {
            config.static_servers = parse_server_list(list)?;
        }
        if let Some(attempts) = self.attempts_per_server {
            config.attempts_per_server = attempts;
        }
        if let Some(secs) = self.attempt_timeout {
            config.attempt_timeout_seconds = secs;
        }
        if let Some(secs) = self.backoff_base {
            config.backoff_base_seconds = secs;
        }
        if let Some(cap) = self.max_attempts {
            config.max_total_attempts = cap;
        }
        if let Some(minutes) = self.refresh_interval {
            config.refresh_interval_minutes = minutes;
        }
        Ok(())
    }
}

fn parse_server_list(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| AppError::config(format!("Invalid server id '{s}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn no_flags_keeps_defaults() {
        let cli = parse(&["nhl"]);
        let mut config = Config::default();
        let before = format!("{config:?}");
        cli.apply_to(&mut config).expect("apply");
        assert_eq!(format!("{config:?}"), before);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "nhl",
            "--data-dir",
            "/tmp/nhl-test",
            "--max-attempts",
            "3",
            "--measure-bin",
            "fake-speedtest",
        ]);
        let mut config = Config::default();
        cli.apply_to(&mut config).expect("apply");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/nhl-test"));
        assert_eq!(config.max_total_attempts, 3);
        assert_eq!(config.measure_bin, "fake-speedtest");
    }

    #[test]
    fn static_servers_parse_comma_separated() {
        let cli = parse(&["nhl", "--static-servers", "11, 22,33"]);
        let mut config = Config::default();
        cli.apply_to(&mut config).expect("apply");
        assert_eq!(config.static_servers, vec![11, 22, 33]);
    }

    #[test]
    fn bad_static_server_id_is_a_config_error() {
        let cli = parse(&["nhl", "--static-servers", "11,abc"]);
        let mut config = Config::default();
        let err = cli.apply_to(&mut config).unwrap_err();
        assert_eq!(err.category(), "CONFIG");
    }
}
