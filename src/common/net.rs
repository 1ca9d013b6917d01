//! Network utilities

use crate::{Error, Result};
use serde::Serialize;
use socket2::SockRef;
use std::fmt;
use std::net::IpAddr;
use tokio::net::TcpStream;

/// Default Java-edition server port
pub const DEFAULT_PORT: u16 = 25565;

#[inline]
pub fn configure_tcp_stream(stream: &TcpStream) {
    let _ = stream.set_nodelay(true);
    let sock = SockRef::from(stream);
    let _ = sock.set_keepalive(false);
}

/// Target of a status query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// Build an address from caller input.
    ///
    /// `port` is taken as a wide integer because callers hand us whatever the
    /// request carried; anything outside `1..=65535` is rejected. When `port`
    /// is absent a `host:port` suffix is honoured, otherwise [`DEFAULT_PORT`].
    /// A suffix given together with `port` must agree with it.
    pub fn new(host: &str, port: Option<i64>) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(Error::invalid_input("server address is empty"));
        }

        let (host, embedded) = split_host_port(host)?;

        if host.is_empty() {
            return Err(Error::invalid_input("server address is empty"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(Error::invalid_input(format!(
                "server address contains whitespace: {:?}",
                host
            )));
        }

        let port = match (port, embedded) {
            (Some(p), Some(e)) => {
                let p = validate_port(p)?;
                if p != e {
                    return Err(Error::invalid_input(format!(
                        "port {} conflicts with the port {} in the address",
                        p, e
                    )));
                }
                p
            }
            (Some(p), None) => validate_port(p)?,
            (None, embedded) => embedded.unwrap_or(DEFAULT_PORT),
        };

        Ok(ServerAddress {
            host: host.to_string(),
            port,
        })
    }

    /// Whether the caller pinned a port, either as `port` or a `host:port` suffix
    pub fn has_explicit_port(host: &str, port: Option<i64>) -> bool {
        port.is_some() || matches!(split_host_port(host.trim()), Ok((_, Some(_))))
    }

    /// Whether the host is an IP literal (no DNS involved)
    pub fn is_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }

    /// `host:port` form accepted by `TcpStream::connect`
    pub fn connect_target(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn validate_port(port: i64) -> Result<u16> {
    if (1..=u16::MAX as i64).contains(&port) {
        Ok(port as u16)
    } else {
        Err(Error::invalid_input(format!(
            "port {} is out of range 1-65535",
            port
        )))
    }
}

/// Split an optional `:port` suffix off a host string.
///
/// Bare IPv6 literals (more than one colon, no brackets) carry no port.
fn split_host_port(input: &str) -> Result<(&str, Option<u16>)> {
    if let Some(rest) = input.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::invalid_input(format!("unterminated '[' in {:?}", input)))?;
        return match tail.strip_prefix(':') {
            Some(p) => Ok((host, Some(parse_port(p)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(Error::invalid_input(format!("unexpected {:?} after ']'", tail))),
        };
    }

    match input.rsplit_once(':') {
        Some((host, p)) if !host.contains(':') => Ok((host, Some(parse_port(p)?))),
        _ => Ok((input, None)),
    }
}

fn parse_port(s: &str) -> Result<u16> {
    let port: i64 = s
        .parse()
        .map_err(|_| Error::invalid_input(format!("invalid port {:?}", s)))?;
    validate_port(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        let addr = ServerAddress::new("play.example.com", None).unwrap();
        assert_eq!(addr.port, DEFAULT_PORT);
        assert_eq!(addr.to_string(), "play.example.com:25565");
    }

    #[test]
    fn test_explicit_port_wins() {
        let addr = ServerAddress::new("  mc.example.org ", Some(25577)).unwrap();
        assert_eq!(addr.host, "mc.example.org");
        assert_eq!(addr.port, 25577);
    }

    #[test]
    fn test_embedded_port() {
        let addr = ServerAddress::new("mc.example.org:19132", None).unwrap();
        assert_eq!(addr.host, "mc.example.org");
        assert_eq!(addr.port, 19132);

        let v6 = ServerAddress::new("[::1]:25570", None).unwrap();
        assert_eq!(v6.host, "::1");
        assert_eq!(v6.port, 25570);
        assert_eq!(v6.to_string(), "[::1]:25570");
    }

    #[test]
    fn test_embedded_and_explicit_port() {
        let addr = ServerAddress::new("a.b:25565", Some(25565)).unwrap();
        assert_eq!(addr.host, "a.b");
        assert_eq!(addr.port, 25565);
        assert_eq!(addr.to_string(), "a.b:25565");

        let v6 = ServerAddress::new("[::1]:25570", Some(25570)).unwrap();
        assert_eq!(v6.host, "::1");

        assert!(matches!(
            ServerAddress::new("a.b:25566", Some(25565)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_explicit_port_detection() {
        assert!(ServerAddress::has_explicit_port("a.b", Some(25565)));
        assert!(ServerAddress::has_explicit_port("a.b:25565", None));
        assert!(!ServerAddress::has_explicit_port("a.b", None));
        assert!(!ServerAddress::has_explicit_port("::1", None));
    }

    #[test]
    fn test_bare_ipv6() {
        let addr = ServerAddress::new("2001:db8::1", None).unwrap();
        assert_eq!(addr.host, "2001:db8::1");
        assert_eq!(addr.port, DEFAULT_PORT);
        assert!(addr.is_ip());
    }

    #[test]
    fn test_rejects_empty_and_bad_ports() {
        assert!(matches!(ServerAddress::new("", None), Err(Error::InvalidInput(_))));
        assert!(matches!(ServerAddress::new("   ", Some(1)), Err(Error::InvalidInput(_))));
        assert!(matches!(ServerAddress::new("a.b", Some(0)), Err(Error::InvalidInput(_))));
        assert!(matches!(ServerAddress::new("a.b", Some(70000)), Err(Error::InvalidInput(_))));
        assert!(matches!(ServerAddress::new("a.b:x", None), Err(Error::InvalidInput(_))));
        assert!(matches!(ServerAddress::new("a b", None), Err(Error::InvalidInput(_))));
    }
}
