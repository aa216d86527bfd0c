use chrono::{DateTime, Utc};
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::adapters::{ntp_client, resolver};
use crate::domain::ntp::QueryResult;
use crate::error::NtpError;
use crate::ntp::codec;
use tracing::{debug, instrument, warn};

pub const DEFAULT_HOST: &str = "pool.ntp.org";
pub const DEFAULT_PORT: u16 = 123;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Host and optional port split out of a configured server string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget<'a> {
    pub host: &'a str,
    pub port: Option<u16>,
    pub is_ipv6_literal: bool,
}

fn parse_port(s: &str) -> Result<u16, NtpError> {
    s.parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(|| NtpError::InvalidTarget(format!("invalid port: '{s}'")))
}

/// Split a server string into host and port.
///
/// Accepts `host`, `host:port`, `a.b.c.d[:port]`, `[v6]`, `[v6]:port` and a
/// bare IPv6 literal (which cannot carry a port).
pub fn parse_target(input: &str) -> Result<ParsedTarget<'_>, NtpError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(NtpError::InvalidTarget("empty target".into()));
    }

    if let Some(rest) = s.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| NtpError::InvalidTarget(format!("missing closing ']' in '{s}'")))?;
        let port = match tail {
            "" => None,
            _ => {
                let p = tail.strip_prefix(':').ok_or_else(|| {
                    NtpError::InvalidTarget(format!("unexpected trailing characters in '{s}'"))
                })?;
                Some(parse_port(p)?)
            }
        };
        return Ok(ParsedTarget {
            host,
            port,
            is_ipv6_literal: true,
        });
    }

    if s.parse::<Ipv6Addr>().is_ok() {
        return Ok(ParsedTarget {
            host: s,
            port: None,
            is_ipv6_literal: true,
        });
    }

    match s.split_once(':') {
        None => Ok(ParsedTarget {
            host: s,
            port: None,
            is_ipv6_literal: false,
        }),
        Some(("", _)) => Err(NtpError::InvalidTarget(format!(
            "missing host before port in '{s}'"
        ))),
        Some((host, port)) => Ok(ParsedTarget {
            host,
            port: Some(parse_port(port)?),
            is_ipv6_literal: false,
        }),
    }
}

/// Immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Primary host, optionally with `:port`.
    pub host: String,
    /// Port used for hosts that do not carry their own.
    pub port: u16,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Hosts tried in order after the primary fails.
    pub fallbacks: Vec<String>,
    /// Resolve IPv6 addresses only.
    pub ipv6: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            fallbacks: Vec::new(),
            ipv6: false,
        }
    }
}

impl ClientConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }
}

/// NTP query engine with sequential host fallback.
///
/// Holds no state between calls; a single client can be shared and queried
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct NtpClient {
    config: ClientConfig,
}

impl NtpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Primary host followed by the fallbacks, in attempt order.
    pub fn servers(&self) -> Vec<&str> {
        std::iter::once(self.config.host.as_str())
            .chain(self.config.fallbacks.iter().map(String::as_str))
            .collect()
    }

    /// Query the primary host, falling back to each configured fallback in
    /// turn. Returns the first successful reply.
    #[instrument(skip(self), fields(primary = %self.config.host))]
    pub async fn query(&self) -> Result<QueryResult, NtpError> {
        let servers = self.servers();
        let mut attempted = Vec::with_capacity(servers.len());
        let mut last = None;

        for host in servers {
            attempted.push(host.to_string());
            match self.attempt(host).await {
                Ok(res) => return Ok(res),
                Err(e) => {
                    warn!(host, error = %e, "NTP query attempt failed");
                    last = Some(e);
                }
            }
        }

        let last = last.unwrap_or_else(|| NtpError::Other("no servers configured".into()));
        Err(NtpError::AllServersUnreachable {
            attempted,
            last: Box::new(last),
        })
    }

    /// Server time from the transmit timestamp of the first successful reply.
    pub async fn get_time(&self) -> Result<DateTime<Utc>, NtpError> {
        let res = self.query().await?;
        res.server_time().ok_or_else(|| {
            NtpError::MalformedPacket("transmit timestamp out of calendar range".into())
        })
    }

    /// Two-point offset in milliseconds: server transmit time minus local
    /// receive time.
    pub async fn get_offset(&self) -> Result<f64, NtpError> {
        Ok(self.query().await?.offset_ms())
    }

    /// One independent attempt: fresh request, fresh socket. Resolution and
    /// the UDP exchange share the per-attempt deadline.
    async fn attempt(&self, host: &str) -> Result<QueryResult, NtpError> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.resolve_and_exchange(host))
            .await
            .map_err(|_| NtpError::Timeout {
                host: host.to_string(),
                timeout_ms: timeout.as_millis(),
            })?
    }

    async fn resolve_and_exchange(&self, host: &str) -> Result<QueryResult, NtpError> {
        let parsed = parse_target(host)?;
        let port = parsed.port.unwrap_or(self.config.port);
        let ipv6 = self.config.ipv6 || parsed.is_ipv6_literal;
        let ip = resolver::resolve_ip(parsed.host, port, ipv6).await?;
        let addr = SocketAddr::new(ip, port);
        debug!(host, %addr, "sending NTP request");

        let request = codec::build_request();
        let exchange = ntp_client::exchange(addr, &request).await?;
        let packet = codec::parse_response(&exchange.raw)?;

        if packet.originate.to_bytes() != codec::transmit_field(&request) {
            debug!(host, "originate timestamp does not echo the request nonce");
        }

        Ok(QueryResult {
            raw: exchange.raw,
            packet,
            server_ip: ip,
            port,
            used_server: host.to_string(),
            client_send_ms: exchange.client_send_ms,
            client_receive_ms: exchange.client_receive_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_target_forms() {
        let t = parse_target("time.example.org").unwrap();
        assert_eq!((t.host, t.port, t.is_ipv6_literal), ("time.example.org", None, false));

        let t = parse_target("10.0.0.1:1123").unwrap();
        assert_eq!((t.host, t.port), ("10.0.0.1", Some(1123)));

        let t = parse_target("[2001:db8::1]:123").unwrap();
        assert_eq!((t.host, t.port, t.is_ipv6_literal), ("2001:db8::1", Some(123), true));

        let t = parse_target("2001:db8::1").unwrap();
        assert_eq!((t.host, t.port, t.is_ipv6_literal), ("2001:db8::1", None, true));

        let t = parse_target("[::1]").unwrap();
        assert_eq!((t.host, t.port, t.is_ipv6_literal), ("::1", None, true));
    }

    #[test]
    fn rejects_bad_targets() {
        for bad in ["", "   ", ":123", "host:0", "host:70000", "host:abc", "[::1", "[::1]x", "a:b:c"] {
            assert!(
                matches!(parse_target(bad), Err(NtpError::InvalidTarget(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn default_config() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.host, "pool.ntp.org");
        assert_eq!(cfg.port, 123);
        assert_eq!(cfg.timeout, Duration::from_millis(5000));
        assert!(cfg.fallbacks.is_empty());
    }

    #[test]
    fn servers_lists_primary_first() {
        let client = NtpClient::new(
            ClientConfig::default()
                .with_host("a.example")
                .with_fallbacks(["b.example", "c.example"]),
        );
        assert_eq!(client.servers(), vec!["a.example", "b.example", "c.example"]);
    }

    #[tokio::test]
    async fn invalid_primary_counts_as_failed_attempt() {
        let client = NtpClient::new(ClientConfig::default().with_host("host:0"));
        let err = client.query().await.unwrap_err();
        match err {
            NtpError::AllServersUnreachable { attempted, last } => {
                assert_eq!(attempted, vec!["host:0".to_string()]);
                assert!(matches!(*last, NtpError::InvalidTarget(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
