//! Search-scrape discovery provider

use super::{http_client, DiscoveryContext, DiscoveryProvider, SourceKind, SuggestionBlock};
use crate::config::DiscoveryConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Result links on the HTML search page
const RESULT_LINK_SELECTOR: &str = "a.result__a[href]";

/// Query parameter holding the real target of a redirect link
const REDIRECT_PARAM: &str = "uddg";

pub const NO_RESULTS_TEXT: &str = "No results found.";

/// Search provider: GET the endpoint, collect result links
pub struct SearchProvider {
    client: reqwest::Client,
    endpoint: String,
    query: String,
    max_results: usize,
}

impl SearchProvider {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(SearchProvider {
            client: http_client(config.timeout(), &config.search.user_agent)?,
            endpoint: config.search.endpoint.clone(),
            query: config.search.query.clone(),
            max_results: config.max_results,
        })
    }

    async fn search(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", self.query.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::http(format!("search endpoint returned {}", status)));
        }

        let body = resp.text().await?;
        Ok(extract_result_links(&body, self.max_results))
    }
}

#[async_trait]
impl DiscoveryProvider for SearchProvider {
    fn kind(&self) -> SourceKind {
        SourceKind::Search
    }

    async fn suggest_alternatives(&self, ctx: &DiscoveryContext) -> SuggestionBlock {
        match self.search().await {
            Ok(links) if links.is_empty() => {
                debug!("[{}] search returned no result links", ctx.address);
                SuggestionBlock::new(SourceKind::Search, NO_RESULTS_TEXT)
            }
            Ok(links) => {
                debug!("[{}] search returned {} links", ctx.address, links.len());
                let text = links
                    .iter()
                    .map(|link| format!("- {}", link))
                    .collect::<Vec<_>>()
                    .join("\n");
                SuggestionBlock::new(SourceKind::Search, text)
            }
            Err(e) => {
                warn!("[{}] alternative search failed: {}", ctx.address, e);
                SuggestionBlock::new(SourceKind::Search, format!("Search failed: {}", e))
            }
        }
    }
}

/// Collect up to `max` absolute result URLs in document order, without duplicates
pub fn extract_result_links(html: &str, max: usize) -> Vec<String> {
    let selector = match Selector::parse(RESULT_LINK_SELECTOR) {
        Ok(selector) => selector,
        Err(e) => {
            warn!("invalid result selector {}: {}", RESULT_LINK_SELECTOR, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();

    for anchor in document.select(&selector) {
        if links.len() >= max {
            break;
        }
        let Some(link) = anchor.value().attr("href").and_then(normalize_link) else {
            continue;
        };
        if !links.contains(&link) {
            links.push(link);
        }
    }

    links
}

/// Turn an href into an absolute http(s) URL, unwrapping redirect links.
///
/// `href` is the attribute value as decoded by the HTML parser.
fn normalize_link(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    let url = Url::parse(&absolute).ok()?;
    let target = url
        .query_pairs()
        .find(|(key, _)| key == REDIRECT_PARAM)
        .and_then(|(_, value)| Url::parse(&value).ok())
        .unwrap_or(url);

    match target.scheme() {
        "http" | "https" => Some(target.to_string()),
        _ => None,
    }
}
