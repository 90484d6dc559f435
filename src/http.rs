use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::{Fetcher, Page, Result};

/// Fetches pages over HTTP and extracts the `<a href>` links they contain.
pub struct HttpFetcher {
    client: reqwest::Client,
    domain: Option<String>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            domain: None,
        })
    }

    /// Only report links whose host is `domain`.
    pub fn same_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let base = response.url().clone();
        let body = response.text().await?;
        let links = parse_links(&body, &base, self.domain.as_deref());
        log::debug!("Parsed {} links from {}", links.len(), base);
        Ok(Page { body, links })
    }
}

/// Collects absolute http(s) links from `html`, resolving relative hrefs
/// against `base`. Anchors nested in `<noscript>` are included.
pub fn parse_links(html: &str, base: &Url, domain: Option<&str>) -> Vec<String> {
    let mut links = Vec::new();
    let mut documents = Vec::new();
    let document = Html::parse_document(html);

    let noscript_selector = Selector::parse("noscript").unwrap();
    for noscript in document.select(&noscript_selector) {
        let document = Html::parse_document(&noscript.text().collect::<Vec<_>>().join(""));
        documents.push(document);
    }
    documents.push(document);

    let anchor_selector = Selector::parse("a[href]").unwrap();
    for document in documents {
        for link in document.select(&anchor_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_link(base, href) else {
                continue;
            };
            if let Some(domain) = domain {
                if url.domain() != Some(domain) {
                    log::trace!("Skipping off-domain link {}", url);
                    continue;
                }
            }
            links.push(url.to_string());
        }
    }
    links
}

fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }
    match base.join(href) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Ignoring href {:?}: {}", href, e);
            None
        }
    }
}
