//! Network probes used to judge mirror liveness
//!
//! Every probe answers with a plain `bool`. Any failure (lookup error, refused
//! connection, timeout, protocol error, non-success status) is `false`; the
//! classifier chains these answers and never needs the cause.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

/// DNS resolution of a mirror host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Whether `host` resolves to at least one address
    async fn resolves(&self, host: &str) -> bool;
}

/// Transport-level reachability of a mirror's service port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceProber: Send + Sync {
    /// Whether the service implied by `mirror_url`'s scheme accepts connections
    async fn is_online(&self, mirror_url: &str) -> bool;
}

/// Retrieval of a single URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlProber: Send + Sync {
    /// Whether `url` can be retrieved with a success status
    async fn is_fetchable(&self, url: &str, user_agent: &str) -> bool;
}

/// Scheme of a URL ("http" for "http://host/")
pub fn scheme(url: &str) -> &str {
    url.split(':').next().unwrap_or("")
}

/// Authority segment of a URL (third `/`-delimited segment), if non-empty
pub fn authority(url: &str) -> Option<&str> {
    url.split('/').nth(2).filter(|segment| !segment.is_empty())
}

/// Split an authority into host and optional explicit port, dropping userinfo
pub fn split_host_port(authority: &str) -> (&str, Option<u16>) {
    let host_port = authority.rsplit('@').next().unwrap_or(authority);

    // Bracketed IPv6 literal: [::1]:8080
    if let Some(rest) = host_port.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }

    match host_port.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (host_port, None),
        },
        _ => (host_port, None),
    }
}

/// System DNS resolver bounded by a timeout
#[derive(Debug, Clone)]
pub struct DnsResolver {
    timeout: Duration,
}

impl DnsResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolves(&self, host: &str) -> bool {
        if host.is_empty() {
            return false;
        }

        let (host, _) = split_host_port(host);

        match timeout(self.timeout, lookup_host((host, 0))).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                debug!("DNS lookup for {} failed: {}", host, e);
                false
            }
            Err(_) => {
                debug!("DNS lookup for {} timed out", host);
                false
            }
        }
    }
}

/// Raw TCP connect to the scheme's well-known port
#[derive(Debug, Clone)]
pub struct TcpServiceProber {
    ports: BTreeMap<String, u16>,
    timeout: Duration,
}

impl TcpServiceProber {
    pub fn new(ports: BTreeMap<String, u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }

    /// Host and port to connect to, or `None` when the URL is not probeable
    pub fn endpoint<'a>(&self, mirror_url: &'a str) -> Option<(&'a str, u16)> {
        let default_port = *self.ports.get(scheme(mirror_url))?;
        let (host, explicit_port) = split_host_port(authority(mirror_url)?);

        if host.is_empty() {
            return None;
        }

        Some((host, explicit_port.unwrap_or(default_port)))
    }
}

#[async_trait]
impl ServiceProber for TcpServiceProber {
    async fn is_online(&self, mirror_url: &str) -> bool {
        let Some((host, port)) = self.endpoint(mirror_url) else {
            debug!("No probeable service in {}", mirror_url);
            return false;
        };

        match timeout(self.timeout, TcpStream::connect((host, port))).await {
            // Dropping the stream closes the connection
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("Connect to {}:{} failed: {}", host, port, e);
                false
            }
            Err(_) => {
                debug!("Connect to {}:{} timed out", host, port);
                false
            }
        }
    }
}

/// HTTP retrieval via reqwest
#[derive(Debug, Clone)]
pub struct HttpUrlProber {
    client: reqwest::Client,
}

impl HttpUrlProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UrlProber for HttpUrlProber {
    async fn is_fetchable(&self, url: &str, user_agent: &str) -> bool {
        if url.is_empty() {
            return false;
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match response {
            Ok(_) => true,
            Err(e) => {
                debug!("Fetch of {} failed: {}", url, e);
                false
            }
        }
    }
}
