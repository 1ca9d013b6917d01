//! SRV resolver for `_minecraft._tcp` records

use crate::common::net::ServerAddress;
use crate::config::DnsConfig;
use crate::{Error, Result};
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

/// Service label queried in front of the host name
const SRV_PREFIX: &str = "_minecraft._tcp.";

/// One SRV answer, reduced to what target selection needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvTarget {
    pub priority: u16,
    pub weight: u16,
    pub host: String,
    pub port: u16,
}

/// Resolves the server address advertised through SRV records
pub struct SrvResolver {
    resolver: TokioAsyncResolver,
}

impl SrvResolver {
    /// Create new resolver from config
    pub fn new(config: &DnsConfig) -> Result<Self> {
        let resolver = Self::build_resolver(&config.nameserver, config.timeout())?;
        Ok(SrvResolver { resolver })
    }

    /// Build resolver from nameserver list
    fn build_resolver(nameservers: &[String], timeout: Duration) -> Result<TokioAsyncResolver> {
        if nameservers.is_empty() {
            // Use system default
            let resolver = TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|e| Error::dns(format!("Failed to create system resolver: {}", e)))?;
            return Ok(resolver);
        }

        let mut config = ResolverConfig::new();
        for ns in nameservers {
            match Self::parse_nameserver(ns) {
                Some(addr) => config.add_name_server(NameServerConfig::new(addr, Protocol::Udp)),
                None => return Err(Error::config(format!("invalid nameserver '{}'", ns))),
            }
        }

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;

        Ok(TokioAsyncResolver::tokio(config, opts))
    }

    /// Parse `ip` or `ip:port`
    fn parse_nameserver(ns: &str) -> Option<SocketAddr> {
        if let Ok(addr) = ns.parse::<SocketAddr>() {
            return Some(addr);
        }
        format!("{}:53", ns).parse().ok()
    }

    /// Look up the SRV record for `host`.
    ///
    /// `Ok(None)` when the name has no record; IP literals never do.
    pub async fn lookup(&self, host: &str) -> Result<Option<ServerAddress>> {
        if host.parse::<std::net::IpAddr>().is_ok() {
            return Ok(None);
        }

        let name = format!("{}{}", SRV_PREFIX, host.trim_end_matches('.'));
        let response = match self.resolver.srv_lookup(name.as_str()).await {
            Ok(response) => response,
            Err(e) => {
                debug!("SRV lookup for {} returned nothing: {}", name, e);
                return Ok(None);
            }
        };

        let targets: Vec<SrvTarget> = response
            .iter()
            .map(|srv| SrvTarget {
                priority: srv.priority(),
                weight: srv.weight(),
                host: srv.target().to_utf8(),
                port: srv.port(),
            })
            .collect();

        let Some(target) = select_target(&targets) else {
            return Ok(None);
        };

        let address = ServerAddress::new(target.host.trim_end_matches('.'), Some(target.port as i64))
            .map_err(|e| Error::dns(format!("SRV target for {} is unusable: {}", host, e)))?;
        debug!("SRV {} -> {}", name, address);
        Ok(Some(address))
    }
}

/// Lowest priority wins; ties go to the heaviest weight, then answer order.
pub fn select_target(targets: &[SrvTarget]) -> Option<&SrvTarget> {
    targets
        .iter()
        .filter(|t| t.port != 0 && t.host.trim_end_matches('.') != "")
        .min_by(|a, b| a.priority.cmp(&b.priority).then(b.weight.cmp(&a.weight)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(priority: u16, weight: u16, host: &str, port: u16) -> SrvTarget {
        SrvTarget {
            priority,
            weight,
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn test_select_lowest_priority_then_weight() {
        let targets = vec![
            target(10, 5, "b.example.com.", 25566),
            target(5, 1, "c.example.com.", 25567),
            target(5, 9, "a.example.com.", 25565),
        ];
        assert_eq!(select_target(&targets).unwrap().host, "a.example.com.");
    }

    #[test]
    fn test_select_skips_null_targets() {
        let targets = vec![target(0, 0, ".", 0), target(1, 0, "mc.example.com.", 25570)];
        assert_eq!(select_target(&targets).unwrap().port, 25570);
        assert!(select_target(&[target(0, 0, ".", 0)]).is_none());
        assert!(select_target(&[]).is_none());
    }

    #[test]
    fn test_parse_nameserver() {
        assert_eq!(
            SrvResolver::parse_nameserver("1.1.1.1"),
            Some("1.1.1.1:53".parse().unwrap())
        );
        assert_eq!(
            SrvResolver::parse_nameserver("9.9.9.9:5353"),
            Some("9.9.9.9:5353".parse().unwrap())
        );
        assert!(SrvResolver::parse_nameserver("dns.example").is_none());
    }

    #[tokio::test]
    async fn test_ip_literal_skips_lookup() {
        let config = DnsConfig {
            nameserver: vec!["127.0.0.1:9".to_string()],
            ..DnsConfig::default()
        };
        let resolver = SrvResolver::new(&config).unwrap();
        assert!(resolver.lookup("10.0.0.1").await.unwrap().is_none());
    }
}
