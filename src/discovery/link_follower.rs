//! # Link-Following Discovery
//!
//! Walks a chain of pages from a seed location by repeatedly asking a
//! [`PageSource`] for the page's "next" link:
//!
//! ```text
//! seed ──next──▶ page 2 ──next──▶ page 3 ──(no link)──▶ End
//! ```
//!
//! Relative links are resolved against the page they appear on. The walk
//! fails instead of looping when a link revisits a page or the page limit
//! is exceeded.

use super::DiscoveryProducer;
use crate::error::DiscoveryError;
use crate::orchestration::types::WorkItem;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use url::Url;

/// Looks up the "next" link of a page
///
/// Fetching and markup parsing live behind this trait. The returned link
/// may be relative to `location`.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn next_link(&self, location: &str) -> Result<Option<String>, DiscoveryError>;
}

/// In-memory page graph: location to raw `href` of its next link
#[derive(Debug, Clone, Default)]
pub struct StaticPageSource {
    links: HashMap<String, String>,
    unreachable: HashSet<String>,
}

impl StaticPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link(mut self, location: impl Into<String>, href: impl Into<String>) -> Self {
        self.links.insert(location.into(), href.into());
        self
    }

    /// Make lookups of `location` fail as unreachable
    pub fn with_unreachable(mut self, location: impl Into<String>) -> Self {
        self.unreachable.insert(location.into());
        self
    }
}

#[async_trait]
impl PageSource for StaticPageSource {
    async fn next_link(&self, location: &str) -> Result<Option<String>, DiscoveryError> {
        if self.unreachable.contains(location) {
            return Err(DiscoveryError::Unreachable {
                location: location.to_string(),
                reason: "page unavailable".to_string(),
            });
        }
        Ok(self.links.get(location).cloned())
    }
}

/// Producer that follows "next" links from a seed location
#[derive(Debug)]
pub struct LinkFollowingDiscovery<S> {
    source: S,
    max_pages: usize,
    pending: Option<Url>,
    visited: HashSet<String>,
    produced: usize,
}

impl<S: PageSource> LinkFollowingDiscovery<S> {
    /// `seed` must be an absolute URL
    pub fn new(seed: &str, source: S, max_pages: usize) -> Result<Self, DiscoveryError> {
        let seed_url = Url::parse(seed).map_err(|e| DiscoveryError::InvalidSeed {
            location: seed.to_string(),
            reason: e.to_string(),
        })?;

        let mut visited = HashSet::new();
        visited.insert(seed_url.as_str().to_string());

        Ok(Self {
            source,
            max_pages,
            pending: Some(seed_url),
            visited,
            produced: 0,
        })
    }

    /// Pages yielded so far
    pub fn produced(&self) -> usize {
        self.produced
    }
}

#[async_trait]
impl<S: PageSource> DiscoveryProducer for LinkFollowingDiscovery<S> {
    async fn next_item(&mut self) -> Result<Option<WorkItem>, DiscoveryError> {
        let Some(location) = self.pending.take() else {
            return Ok(None);
        };

        if self.produced >= self.max_pages {
            warn!(max_pages = self.max_pages, next = %location, "Page limit reached");
            return Err(DiscoveryError::PageLimitExceeded {
                max_pages: self.max_pages,
            });
        }

        if let Some(href) = self.source.next_link(location.as_str()).await? {
            let next = location.join(&href).map_err(|e| DiscoveryError::Malformed {
                location: location.to_string(),
                reason: format!("bad next link '{href}': {e}"),
            })?;

            if !self.visited.insert(next.as_str().to_string()) {
                return Err(DiscoveryError::CycleDetected {
                    from: location.to_string(),
                    location: next.to_string(),
                });
            }
            debug!(from = %location, next = %next, "Following next link");
            self.pending = Some(next);
        }

        self.produced += 1;
        Ok(Some(WorkItem::new(location.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::collect_work_items;

    const SEED: &str = "http://books.example.com/";

    fn locators(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(WorkItem::locator).collect()
    }

    #[tokio::test]
    async fn test_follows_relative_links_until_none() {
        let source = StaticPageSource::new()
            .with_link(SEED, "catalogue/page-2.html")
            .with_link("http://books.example.com/catalogue/page-2.html", "page-3.html");
        let mut discovery = LinkFollowingDiscovery::new(SEED, source, 100).unwrap();

        let items = collect_work_items(&mut discovery).await.unwrap();

        assert_eq!(
            locators(&items),
            vec![
                "http://books.example.com/",
                "http://books.example.com/catalogue/page-2.html",
                "http://books.example.com/catalogue/page-3.html",
            ]
        );
        assert_eq!(discovery.produced(), 3);
    }

    #[tokio::test]
    async fn test_single_page_without_link() {
        let mut discovery = LinkFollowingDiscovery::new(SEED, StaticPageSource::new(), 10).unwrap();

        let items = collect_work_items(&mut discovery).await.unwrap();

        assert_eq!(locators(&items), vec![SEED]);
    }

    #[tokio::test]
    async fn test_cycle_is_an_error() {
        let source = StaticPageSource::new()
            .with_link(SEED, "page-2.html")
            .with_link("http://books.example.com/page-2.html", "/");
        let mut discovery = LinkFollowingDiscovery::new(SEED, source, 10).unwrap();

        let err = collect_work_items(&mut discovery).await.unwrap_err();

        assert_eq!(
            err,
            DiscoveryError::CycleDetected {
                from: "http://books.example.com/page-2.html".to_string(),
                location: SEED.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_page_limit() {
        let source = StaticPageSource::new()
            .with_link(SEED, "2")
            .with_link("http://books.example.com/2", "3");
        let mut discovery = LinkFollowingDiscovery::new(SEED, source, 2).unwrap();

        let err = collect_work_items(&mut discovery).await.unwrap_err();

        assert_eq!(err, DiscoveryError::PageLimitExceeded { max_pages: 2 });
    }

    #[tokio::test]
    async fn test_unreachable_page_aborts() {
        let source = StaticPageSource::new().with_unreachable(SEED);
        let mut discovery = LinkFollowingDiscovery::new(SEED, source, 10).unwrap();

        assert!(matches!(
            discovery.next_item().await,
            Err(DiscoveryError::Unreachable { .. })
        ));
    }

    #[test]
    fn test_relative_seed_is_rejected() {
        let err = LinkFollowingDiscovery::new("catalogue/page-1.html", StaticPageSource::new(), 10)
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidSeed { .. }));
    }
}
