// Endpoint parsing and host resolution.

use std::fmt;
use std::io;
use std::net::IpAddr;

use crate::error::ProbeError;

/// A `host:port` target as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: String,
    raw: String,
}

impl Endpoint {
    /// Splits `host:port`. IPv6 literals must be bracketed (`[::1]:8899`).
    pub fn parse(s: &str) -> Result<Self, ProbeError> {
        let invalid = || ProbeError::InvalidAddressFormat(s.to_string());

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(invalid)?;
            let port = after.strip_prefix(':').ok_or_else(invalid)?;
            if host.contains('[') || port.contains(['[', ']']) {
                return Err(invalid());
            }
            (host, port)
        } else {
            let (host, port) = s.split_once(':').ok_or_else(invalid)?;
            if port.contains(':') || host.contains(['[', ']']) || port.contains(['[', ']']) {
                return Err(invalid());
            }
            (host, port)
        };

        if host.is_empty() || port.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port: port.to_string(),
            raw: s.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// The endpoint exactly as it was given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub ip: IpAddr,
}

/// Resolves the endpoint host to one address, preferring IPv4.
pub async fn resolve(endpoint: &Endpoint) -> Result<ResolvedTarget, ProbeError> {
    let host = endpoint.host();

    // First try to parse as IP address
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ResolvedTarget { ip });
    }

    let failure = |source| ProbeError::ResolutionFailure {
        host: host.to_string(),
        source,
    };
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(failure)?
        .map(|a| a.ip())
        .collect();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .map(|&ip| ResolvedTarget { ip })
        .ok_or_else(|| {
            failure(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses returned",
            ))
        })
}
