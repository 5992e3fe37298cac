use std::fmt;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::str::FromStr;

/// Where a transfer server is listening, as carried in signaling messages
/// (`"<address>:<port>"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferEndpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointParseError {
    #[error("missing ':<port>' in endpoint '{0}'")]
    MissingPort(String),

    #[error("empty host in endpoint '{0}'")]
    EmptyHost(String),

    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

impl TransferEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl From<SocketAddr> for TransferEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self { host: addr.ip().to_string(), port: addr.port() }
    }
}

impl fmt::Display for TransferEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for TransferEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(trimmed.to_string()))?;
        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(trimmed.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError::InvalidPort(port.to_string()))?;
        Ok(Self { host: host.to_string(), port })
    }
}

/// Address of the interface this host uses for outbound traffic.
///
/// No packet is sent: connecting a UDP socket only selects a route.
pub fn local_ip_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}
