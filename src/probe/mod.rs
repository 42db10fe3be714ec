//! Auxiliary network probes
//!
//! Lightweight, non-retried measurements taken on every invocation: ICMP
//! round trip and loss against the gateway and two public hosts, one timed
//! DNS resolution against a fixed resolver, one timed HTTP round trip, and
//! wireless/gateway context detection. Each probe is bounded in time and
//! best-effort: a failure degrades its record field to unknown and never
//! aborts the invocation.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::{Duration, Instant};

use regex::Regex;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::Config;
use crate::models::{PingSample, ProbeReport, WifiContext};
use crate::process::run_unchecked_with_timeout;

/// Run the full probe pass sequentially and assemble the report.
///
/// Never fails: each individual probe degrades to unknown on error.
pub async fn collect(config: &Config) -> ProbeReport {
    let route = default_route(config.probe_timeout()).await;
    let gateway = config
        .gateway
        .clone()
        .or_else(|| route.as_ref().map(|r| r.gateway.clone()));

    let gateway_sample = match &gateway {
        Some(address) => ping_probe(address, config.ping_count, config.probe_timeout()).await,
        None => {
            tracing::warn!("no default route and no gateway override; gateway probe skipped");
            PingSample::lost()
        }
    };

    let public_host_1 =
        ping_probe(&config.public_host_1, config.ping_count, config.probe_timeout()).await;
    let public_host_2 =
        ping_probe(&config.public_host_2, config.ping_count, config.probe_timeout()).await;

    let dns_ms = dns_probe(
        &config.dns_probe_host,
        &config.dns_resolver,
        config.probe_timeout(),
    )
    .await;

    let http_ms = http_probe(&config.http_probe_url, config.probe_timeout()).await;

    let iface_hint = config
        .iface
        .clone()
        .or_else(|| route.as_ref().map(|r| r.device.clone()));
    let wifi = wifi_context(iface_hint.as_deref(), config.probe_timeout()).await;

    ProbeReport {
        gateway: gateway_sample,
        public_host_1,
        public_host_2,
        dns_ms,
        http_ms,
        wifi,
    }
}

/// ICMP echo measurement via the system `ping` binary.
///
/// Returns the average round trip (absent when no replies arrived) and the
/// loss percentage, which is 100 on total failure and never absent.
pub async fn ping_probe(target: &str, count: u32, timeout: Duration) -> PingSample {
    let args = vec![
        "-c".to_string(),
        count.to_string(),
        "-W".to_string(),
        timeout.as_secs().max(1).to_string(),
        target.to_string(),
    ];
    // Worst case is `count` unanswered requests, each waiting the full -W.
    let budget = timeout * count + Duration::from_secs(2);

    match run_unchecked_with_timeout("ping", &args, budget).await {
        Ok(output) => parse_ping_output(&output.stdout),
        Err(e) => {
            tracing::debug!(host = target, error = %e, "ping probe failed");
            PingSample::lost()
        }
    }
}

fn parse_ping_output(stdout: &str) -> PingSample {
    let loss_pct = capture_f64(r"([\d.]+)% packet loss", stdout).unwrap_or(100.0);
    let avg_ms = capture_f64(r"= [\d.]+/([\d.]+)/", stdout);
    PingSample { avg_ms, loss_pct }
}

fn capture_f64(pattern: &str, text: &str) -> Option<f64> {
    let re = Regex::new(pattern).ok()?;
    let capture = re.captures(text)?.get(1)?;
    f64::from_str(capture.as_str()).ok()
}

/// One timed A-record lookup against exactly the given resolver.
///
/// Returns the query time in milliseconds, or `None` on failure/timeout.
pub async fn dns_probe(hostname: &str, resolver: &str, timeout: Duration) -> Option<u64> {
    let resolver_ip = match IpAddr::from_str(resolver) {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!(resolver = resolver, error = %e, "bad resolver address");
            return None;
        }
    };

    let mut resolver_config = ResolverConfig::new();
    resolver_config.add_name_server(NameServerConfig::new(
        SocketAddr::new(resolver_ip, 53),
        Protocol::Udp,
    ));
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;

    let async_resolver = TokioAsyncResolver::tokio(resolver_config, opts);

    let start = Instant::now();
    match tokio::time::timeout(timeout, async_resolver.lookup_ip(hostname)).await {
        Ok(Ok(_)) => Some(elapsed_ms(start)),
        Ok(Err(e)) => {
            tracing::debug!(hostname = hostname, error = %e, "dns probe failed");
            None
        }
        Err(_) => {
            tracing::debug!(hostname = hostname, "dns probe timed out");
            None
        }
    }
}

/// One timed HTTP GET. Returns the total round-trip time in whole
/// milliseconds, or `None` on any failure.
pub async fn http_probe(probe_url: &str, timeout: Duration) -> Option<u64> {
    let client = match reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("network-health-logger/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!(error = %e, "http client build failed");
            return None;
        }
    };

    let start = Instant::now();
    match client.get(probe_url).send().await {
        Ok(response) => {
            // Drain the body so the timing covers the full round trip.
            let _ = response.bytes().await;
            Some(elapsed_ms(start))
        }
        Err(e) => {
            tracing::debug!(url = probe_url, error = %e, "http probe failed");
            None
        }
    }
}

/// Default route as reported by `ip route show default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    pub gateway: String,
    pub device: String,
}

/// Read the default route from the routing table. Best-effort.
pub async fn default_route(timeout: Duration) -> Option<DefaultRoute> {
    let args = vec!["route".to_string(), "show".to_string(), "default".to_string()];
    match run_unchecked_with_timeout("ip", &args, timeout).await {
        Ok(output) if output.status == 0 => parse_default_route(&output.stdout),
        Ok(_) | Err(_) => None,
    }
}

fn parse_default_route(stdout: &str) -> Option<DefaultRoute> {
    // Expect a line like: "default via 192.168.12.1 dev wlp2s0 proto dhcp"
    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 5 && parts[0] == "default" && parts[1] == "via" && parts[3] == "dev" {
            return Some(DefaultRoute {
                gateway: parts[2].to_string(),
                device: parts[4].to_string(),
            });
        }
    }
    None
}

/// Detect wireless context for the active interface. All fields optional.
pub async fn wifi_context(iface_hint: Option<&str>, timeout: Duration) -> WifiContext {
    let iface = match iface_hint {
        Some(name) => Some(name.to_string()),
        None => detect_wireless_iface(timeout).await,
    };

    let Some(iface_name) = iface else {
        return WifiContext::default();
    };

    let args = vec![
        "dev".to_string(),
        iface_name.clone(),
        "link".to_string(),
    ];
    let (ssid, band) = match run_unchecked_with_timeout("iw", &args, timeout).await {
        Ok(output) if output.status == 0 => parse_iw_link(&output.stdout),
        Ok(_) | Err(_) => (None, None),
    };

    WifiContext {
        iface: Some(iface_name),
        ssid,
        band,
    }
}

async fn detect_wireless_iface(timeout: Duration) -> Option<String> {
    let args = vec!["dev".to_string()];
    match run_unchecked_with_timeout("iw", &args, timeout).await {
        Ok(output) if output.status == 0 => parse_iw_dev(&output.stdout),
        Ok(_) | Err(_) => None,
    }
}

fn parse_iw_dev(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("Interface "))
        .map(|name| name.to_string())
}

fn parse_iw_link(stdout: &str) -> (Option<String>, Option<String>) {
    let mut ssid = None;
    let mut band = None;
    for line in stdout.lines() {
        let trimmed = line.trim();
        if let Some(value) = trimmed.strip_prefix("SSID: ") {
            ssid = Some(value.to_string());
        } else if let Some(value) = trimmed.strip_prefix("freq: ") {
            band = value
                .split('.')
                .next()
                .and_then(|f| f.parse::<u32>().ok())
                .map(band_from_freq);
        }
    }
    (ssid, band)
}

fn band_from_freq(freq_mhz: u32) -> String {
    if freq_mhz < 3000 {
        "2.4GHz".to_string()
    } else if freq_mhz < 5925 {
        "5GHz".to_string()
    } else {
        "6GHz".to_string()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    let millis = start.elapsed().as_millis();
    millis.try_into().unwrap_or(u64::MAX)
}
