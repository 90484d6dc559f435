use std::{collections::BTreeSet, sync::Arc};

use flume::Sender;
use tokio::sync::Semaphore;

use crate::{Fetcher, TaskCounter, VisitedSet};

pub const DEFAULT_MAX_DEPTH: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Longest chain of links followed from the root. Zero fetches nothing.
    pub max_depth: u32,
    /// Upper bound on concurrent fetches. `None` spawns without admission
    /// control.
    pub max_concurrency: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_concurrency: None,
        }
    }
}

/// A unit of work: explore `url` with `depth` link hops still allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    pub depth: u32,
}

impl CrawlTask {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageVisit {
    pub url: String,
    pub depth: u32,
    pub body: String,
    pub links: Vec<String>,
}

#[derive(Debug)]
pub struct FetchFailure {
    pub url: String,
    pub depth: u32,
    pub error: eyre::Report,
}

/// Everything a crawl observed, in completion order.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub pages: Vec<PageVisit>,
    pub failures: Vec<FetchFailure>,
}

impl CrawlReport {
    /// Every URL the crawl attempted to fetch, successful or not.
    pub fn visited(&self) -> BTreeSet<&str> {
        self.pages
            .iter()
            .map(|p| p.url.as_str())
            .chain(self.failures.iter().map(|f| f.url.as_str()))
            .collect()
    }

    pub fn page(&self, url: &str) -> Option<&PageVisit> {
        self.pages.iter().find(|p| p.url == url)
    }

    pub fn failure(&self, url: &str) -> Option<&FetchFailure> {
        self.failures.iter().find(|f| f.url == url)
    }
}

enum CrawlEvent {
    Fetched(PageVisit),
    Failed(FetchFailure),
}

/// State shared by every task of one crawl.
struct Context {
    fetcher: Arc<dyn Fetcher>,
    visited: VisitedSet,
    counter: TaskCounter,
    permits: Option<Arc<Semaphore>>,
    events: Sender<CrawlEvent>,
}

impl Context {
    /// Registers `task` with the counter and hands it to the runtime. The
    /// increment happens here, before the task can run.
    fn spawn(self: &Arc<Self>, task: CrawlTask) {
        let guard = self.counter.enter();
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            ctx.explore(task).await;
        });
    }

    async fn explore(self: &Arc<Self>, task: CrawlTask) {
        if task.depth == 0 {
            log::debug!("Depth exhausted at {}", task.url);
            return;
        }

        if self.visited.visit(&task.url) {
            log::debug!("Already visited: {}", task.url);
            return;
        }

        log::info!("Visiting: {} (depth {})", task.url, task.depth);

        let fetched = {
            let _permit = match &self.permits {
                // The semaphore is never closed.
                Some(permits) => permits.acquire().await.ok(),
                None => None,
            };
            self.fetcher.fetch(&task.url).await
        };

        let page = match fetched {
            Ok(page) => page,
            Err(error) => {
                log::warn!("Failed to fetch {}: {}", task.url, error);
                let _ = self.events.send(CrawlEvent::Failed(FetchFailure {
                    url: task.url,
                    depth: task.depth,
                    error,
                }));
                return;
            }
        };

        log::info!("Found: {} {:?}", task.url, page.body);

        for link in &page.links {
            self.spawn(CrawlTask::new(link.clone(), task.depth - 1));
        }

        let _ = self.events.send(CrawlEvent::Fetched(PageVisit {
            url: task.url,
            depth: task.depth,
            body: page.body,
            links: page.links,
        }));
    }
}

/// Depth-bounded, deduplicating concurrent crawler.
///
/// Each discovered link becomes its own tokio task. [`Crawler::crawl`]
/// returns once every spawned task has finished, however many the link
/// graph ends up producing.
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self::from_arc(Arc::new(fetcher))
    }

    /// Builds a crawler around a fetcher the caller keeps a handle to.
    pub fn from_arc(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            config: CrawlConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrency = Some(limit);
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawls from `root` until the link graph or the depth budget is
    /// exhausted. Fetch failures only prune their own branch.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn crawl(&self, root: impl Into<String>) -> CrawlReport {
        let (tx, rx) = flume::unbounded();
        let counter = TaskCounter::new();
        let visited = VisitedSet::new();
        let ctx = Arc::new(Context {
            fetcher: Arc::clone(&self.fetcher),
            visited: visited.clone(),
            counter: counter.clone(),
            permits: self
                .config
                .max_concurrency
                .map(|limit| Arc::new(Semaphore::new(limit.max(1)))),
            events: tx,
        });

        let root = root.into();
        log::info!(
            "Starting crawl at {} with max depth {}",
            root,
            self.config.max_depth
        );
        ctx.spawn(CrawlTask::new(root, self.config.max_depth));
        drop(ctx);

        counter.wait().await;

        let mut report = CrawlReport::default();
        for event in rx.drain() {
            match event {
                CrawlEvent::Fetched(page) => report.pages.push(page),
                CrawlEvent::Failed(failure) => report.failures.push(failure),
            }
        }
        log::info!(
            "Crawl finished: {} visited, {} fetched, {} failed",
            visited.len(),
            report.pages.len(),
            report.failures.len()
        );
        report
    }
}

/// Crawls `root` with `fetcher` down to `max_depth` and waits for completion.
pub async fn start(
    root: impl Into<String>,
    max_depth: u32,
    fetcher: impl Fetcher + 'static,
) -> CrawlReport {
    Crawler::new(fetcher).max_depth(max_depth).crawl(root).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::StaticFetcher;

    const A: &str = "https://golang.org/";
    const B: &str = "https://golang.org/pkg/";
    const C: &str = "https://golang.org/cmd/";
    const D: &str = "https://golang.org/pkg/fmt/";
    const E: &str = "https://golang.org/pkg/os/";

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sample_graph_visits_each_page_once() {
        let fetcher = Arc::new(StaticFetcher::sample());
        let report = Crawler::from_arc(fetcher.clone())
            .max_depth(4)
            .crawl(A)
            .await;

        assert_eq!(report.visited(), BTreeSet::from([A, B, C, D, E]));
        for url in [A, B, C, D, E] {
            assert_eq!(fetcher.fetch_count(url), 1, "{url}");
        }
        assert_eq!(report.pages.len(), 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failure(C).unwrap().error.to_string(),
            format!("not found: {C}")
        );
        assert_eq!(report.page(A).unwrap().depth, 4);
        assert_eq!(report.page(B).unwrap().body, "Packages");
    }

    #[tokio::test]
    async fn zero_depth_fetches_nothing() {
        let fetcher = Arc::new(StaticFetcher::sample());
        let report = Crawler::from_arc(fetcher.clone())
            .max_depth(0)
            .crawl(A)
            .await;
        assert!(report.visited().is_empty());
        assert_eq!(fetcher.total_fetches(), 0);
    }

    #[tokio::test]
    async fn depth_one_fetches_only_root() {
        let fetcher = Arc::new(StaticFetcher::sample());
        let report = Crawler::from_arc(fetcher.clone())
            .max_depth(1)
            .crawl(A)
            .await;
        assert_eq!(report.visited(), BTreeSet::from([A]));
        assert_eq!(fetcher.total_fetches(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bounded_mode_visits_same_pages() {
        let fetcher = Arc::new(StaticFetcher::sample());
        let report = Crawler::from_arc(fetcher.clone())
            .max_depth(4)
            .max_concurrency(1)
            .crawl(A)
            .await;
        assert_eq!(report.visited(), BTreeSet::from([A, B, C, D, E]));
        assert_eq!(fetcher.total_fetches(), 5);
    }

    #[tokio::test]
    async fn start_runs_to_completion() {
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            start(A, DEFAULT_MAX_DEPTH, StaticFetcher::sample()),
        )
        .await
        .expect("crawl should terminate");
        assert_eq!(report.visited().len(), 5);
    }

    #[test]
    fn builder_sets_config() {
        let crawler = Crawler::new(StaticFetcher::new())
            .max_depth(2)
            .max_concurrency(8);
        assert_eq!(
            *crawler.config(),
            CrawlConfig {
                max_depth: 2,
                max_concurrency: Some(8),
            }
        );
        let crawler = crawler.with_config(CrawlConfig::default());
        assert_eq!(crawler.config().max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(crawler.config().max_concurrency, None);
    }
}
