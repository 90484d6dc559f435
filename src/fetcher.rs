use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::Result;

/// A successfully retrieved resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub body: String,
    pub links: Vec<String>,
}

impl Page {
    pub fn new(
        body: impl Into<String>,
        links: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            body: body.into(),
            links: links.into_iter().map(Into::into).collect(),
        }
    }
}

/// Retrieves a resource and the outbound links found in it.
///
/// Implementations are shared between every crawl task and must tolerate
/// concurrent calls for different URLs.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page>;
}

/// Serves pages from a fixed in-memory link graph.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Page>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(
        mut self,
        url: impl Into<String>,
        body: impl Into<String>,
        links: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.pages.insert(url.into(), Page::new(body, links));
        self
    }

    /// The golang.org tour graph. `https://golang.org/cmd/` is linked but has
    /// no page, so fetching it fails.
    pub fn sample() -> Self {
        Self::new()
            .with_page(
                "https://golang.org/",
                "The Go Programming Language",
                ["https://golang.org/pkg/", "https://golang.org/cmd/"],
            )
            .with_page(
                "https://golang.org/pkg/",
                "Packages",
                [
                    "https://golang.org/",
                    "https://golang.org/cmd/",
                    "https://golang.org/pkg/fmt/",
                    "https://golang.org/pkg/os/",
                ],
            )
            .with_page(
                "https://golang.org/pkg/fmt/",
                "Package fmt",
                ["https://golang.org/", "https://golang.org/pkg/"],
            )
            .with_page(
                "https://golang.org/pkg/os/",
                "Package os",
                ["https://golang.org/", "https://golang.org/pkg/"],
            )
    }

    /// How many times `url` has been requested, whether or not it exists.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Page> {
        *self.fetches.lock().entry(url.to_owned()).or_default() += 1;
        match self.pages.get(url) {
            Some(page) => Ok(page.clone()),
            None => eyre::bail!("not found: {}", url),
        }
    }
}
