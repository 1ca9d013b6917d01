//! Alternative-server discovery
//!
//! Consulted only after a status query came back offline. Two interchangeable
//! providers sit behind [`DiscoveryProvider`]:
//! - [`SearchProvider`]: scrape result links from an HTML search endpoint
//! - [`CompletionProvider`]: ask a chat-completion endpoint for suggestions
//!
//! Providers never fail outward. Any HTTP or parsing problem becomes an
//! explanatory [`SuggestionBlock`] so the caller always gets some text back.

mod completion;
mod search;

pub use completion::CompletionProvider;
pub use search::{extract_result_links, SearchProvider};

use crate::common::net::ServerAddress;
use crate::config::{DiscoveryConfig, DiscoveryKind};
use crate::protocol::OfflineReason;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Where a suggestion block came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Search,
    Completion,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Search => write!(f, "web search"),
            SourceKind::Completion => write!(f, "AI suggestions"),
        }
    }
}

/// Human-readable alternatives produced for an offline server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionBlock {
    pub source_kind: SourceKind,
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

impl SuggestionBlock {
    pub fn new(source_kind: SourceKind, text: impl Into<String>) -> Self {
        SuggestionBlock {
            source_kind,
            text: text.into(),
            generated_at: Utc::now(),
        }
    }
}

/// What the provider knows about the failed query
#[derive(Debug, Clone)]
pub struct DiscoveryContext {
    pub address: ServerAddress,
    pub reason: OfflineReason,
    pub detail: String,
}

/// Capability shared by both discovery variants
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Variant of this provider
    fn kind(&self) -> SourceKind;

    /// Produce suggestions. Must always return a block with non-empty text.
    async fn suggest_alternatives(&self, ctx: &DiscoveryContext) -> SuggestionBlock;

    /// Block used when the caller's deadline elapsed before the provider answered
    fn timed_out(&self, after: Duration) -> SuggestionBlock {
        SuggestionBlock::new(
            self.kind(),
            format!(
                "Could not fetch suggestions: the lookup did not finish within {:.1}s.",
                after.as_secs_f64()
            ),
        )
    }
}

/// Build the provider selected by configuration
pub fn build_provider(config: &DiscoveryConfig) -> Result<Arc<dyn DiscoveryProvider>> {
    let provider: Arc<dyn DiscoveryProvider> = match config.kind {
        DiscoveryKind::Search => Arc::new(SearchProvider::new(config)?),
        DiscoveryKind::Completion => Arc::new(CompletionProvider::new(config)?),
    };
    Ok(provider)
}

/// HTTP client bounded by the discovery request timeout
fn http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| Error::internal(format!("failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider_by_kind() {
        let mut config = DiscoveryConfig::default();
        assert_eq!(build_provider(&config).unwrap().kind(), SourceKind::Search);

        config.kind = DiscoveryKind::Completion;
        config.completion.api_key = Some("sk-test".to_string());
        assert_eq!(build_provider(&config).unwrap().kind(), SourceKind::Completion);
    }

    #[test]
    fn test_timed_out_block() {
        let provider = build_provider(&DiscoveryConfig::default()).unwrap();
        let block = provider.timed_out(Duration::from_millis(1500));
        assert_eq!(block.source_kind, SourceKind::Search);
        assert!(block.text.contains("1.5s"));
    }
}
