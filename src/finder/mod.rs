//! Fallback orchestrator
//!
//! Per invocation: `Start -> Probing -> Online (done)` or
//! `Start -> Probing -> Offline -> Discovering -> done`. Nothing is kept
//! between invocations; a [`Finder`] only holds its immutable collaborators.

mod report;

pub use report::FallbackReport;

use crate::common::net::ServerAddress;
use crate::config::{Config, ProbeConfig};
use crate::discovery::{self, DiscoveryContext, DiscoveryProvider};
use crate::dns::SrvResolver;
use crate::protocol::{OfflineReason, StatusClient, StatusQueryResult};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

struct FinderInner {
    client: StatusClient,
    provider: Arc<dyn DiscoveryProvider>,
    srv: Option<SrvResolver>,
    request_deadline: Duration,
}

/// Entry point for `find_server`; cheap to clone and share across tasks
#[derive(Clone)]
pub struct Finder {
    inner: Arc<FinderInner>,
}

impl Finder {
    /// Build a finder from validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        let provider = discovery::build_provider(&config.discovery)?;

        let srv = if config.probe.srv_lookup {
            match SrvResolver::new(&config.dns) {
                Ok(resolver) => Some(resolver),
                Err(e) => {
                    warn!("SRV lookups disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        info!(
            "Finder ready: discovery={}, srv-lookup={}, deadline={:?}",
            config.discovery.kind,
            srv.is_some(),
            config.probe.request_deadline()
        );
        Ok(Self::with_provider(&config.probe, provider, srv))
    }

    /// Build a finder around an explicit provider
    pub fn with_provider(
        probe: &ProbeConfig,
        provider: Arc<dyn DiscoveryProvider>,
        srv: Option<SrvResolver>,
    ) -> Self {
        Finder {
            inner: Arc::new(FinderInner {
                client: StatusClient::new(probe.connect_timeout(), probe.read_timeout()),
                provider,
                srv,
                request_deadline: probe.request_deadline(),
            }),
        }
    }

    /// Check a server and, when it is offline, attach alternative suggestions.
    ///
    /// Only malformed input is an error (`Error::InvalidInput`, raised before
    /// any network I/O). Every downstream failure is reported inside the
    /// returned [`FallbackReport`].
    pub async fn find_server(&self, server_address: &str, port: Option<i64>) -> Result<FallbackReport> {
        let address = ServerAddress::new(server_address, port)?;
        let deadline = Instant::now() + self.inner.request_deadline;

        let srv_target = if ServerAddress::has_explicit_port(server_address, port) {
            None
        } else {
            self.resolve_srv(&address, deadline).await
        };
        let target = srv_target.as_ref().unwrap_or(&address);

        let outcome = match timeout(remaining(deadline), self.inner.client.query(target)).await {
            Ok(outcome) => outcome,
            Err(_) => StatusQueryResult::offline(
                OfflineReason::Timeout,
                format!(
                    "no answer within the {:.1}s request deadline",
                    self.inner.request_deadline.as_secs_f64()
                ),
            ),
        };

        let failure = match &outcome {
            StatusQueryResult::Online(status) => {
                info!(
                    "[{}] online: {}/{} players, {:.1}ms",
                    address, status.players_online, status.players_max, status.latency_ms
                );
                None
            }
            StatusQueryResult::Offline { reason, detail } => Some((*reason, detail.clone())),
        };
        let Some((reason, detail)) = failure else {
            return Ok(FallbackReport::online(address, srv_target, outcome));
        };

        info!(
            "[{}] offline ({}), asking {:?} provider for alternatives",
            address,
            reason,
            self.inner.provider.kind()
        );

        let ctx = DiscoveryContext {
            address: address.clone(),
            reason,
            detail,
        };
        let budget = remaining(deadline);
        let suggestions = match timeout(budget, self.inner.provider.suggest_alternatives(&ctx)).await {
            Ok(block) => block,
            Err(_) => {
                warn!("[{}] discovery cancelled at the request deadline", address);
                self.inner.provider.timed_out(budget)
            }
        };

        Ok(FallbackReport::offline(address, srv_target, outcome, suggestions))
    }

    async fn resolve_srv(&self, address: &ServerAddress, deadline: Instant) -> Option<ServerAddress> {
        let resolver = self.inner.srv.as_ref()?;
        if address.is_ip() {
            return None;
        }

        match timeout(remaining(deadline), resolver.lookup(&address.host)).await {
            Ok(Ok(Some(target))) => {
                info!("[{}] SRV record points to {}", address, target);
                Some(target)
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!("[{}] ignoring SRV record: {}", address, e);
                None
            }
            Err(_) => None,
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{SourceKind, SuggestionBlock};
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl DiscoveryProvider for CountingProvider {
        fn kind(&self) -> SourceKind {
            SourceKind::Search
        }

        async fn suggest_alternatives(&self, ctx: &DiscoveryContext) -> SuggestionBlock {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            SuggestionBlock::new(SourceKind::Search, format!("- alternative for {}", ctx.address))
        }
    }

    fn finder(deadline_ms: u64, delay: Duration) -> (Finder, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            delay,
        });
        let probe = ProbeConfig {
            connect_timeout_ms: 1000,
            read_timeout_ms: 1000,
            request_deadline_ms: deadline_ms,
            srv_lookup: false,
        };
        (Finder::with_provider(&probe, provider.clone(), None), provider)
    }

    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_empty_address_is_invalid_input() {
        let (finder, provider) = finder(5000, Duration::ZERO);
        let err = finder.find_server("", Some(25565)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_attaches_suggestions() {
        let (finder, provider) = finder(5000, Duration::ZERO);
        let port = closed_port().await;

        let report = finder.find_server("127.0.0.1", Some(port as i64)).await.unwrap();
        assert_eq!(report.outcome().offline_reason(), Some(OfflineReason::ConnectFailure));
        let block = report.suggestions().unwrap();
        assert!(block.text.contains("alternative for 127.0.0.1"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_cancelled_at_deadline() {
        // Accepts but never answers; the read timeout is longer than the deadline.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let (finder, _) = finder(200, Duration::ZERO);
        let report = finder.find_server("127.0.0.1", Some(port as i64)).await.unwrap();
        assert_eq!(report.outcome().offline_reason(), Some(OfflineReason::Timeout));
        assert!(report.suggestions().is_some());
    }

    #[tokio::test]
    async fn test_discovery_cancelled_at_deadline() {
        let (finder, _) = finder(300, Duration::from_secs(30));
        let port = closed_port().await;

        let started = std::time::Instant::now();
        let report = finder.find_server("127.0.0.1", Some(port as i64)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        let block = report.suggestions().unwrap();
        assert!(block.text.starts_with("Could not fetch suggestions"));
    }
}
