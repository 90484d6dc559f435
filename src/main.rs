use std::time::Duration;

use clap::Parser;
use color_eyre::eyre;
use depthcrawl::{
    CrawlConfig, CrawlReport, Crawler, HttpFetcher, StaticFetcher, DEFAULT_MAX_DEPTH,
};
use url::Url;

const SAMPLE_ROOT: &str = "https://golang.org/";

/// Given a starting URL, concurrently visits every page reachable within the depth limit,
/// fetching each page once, and prints the pages visited and the links found on each
#[derive(Parser, Debug)]
#[clap(name = "depthcrawl", author, version, about, long_about = None)]
pub struct Args {
    /// Page to start from. Defaults to the sample root with --sample
    #[clap(value_parser, required_unless_present = "sample")]
    url: Option<Url>,

    /// Longest chain of links to follow from the starting page
    #[clap(short, long, value_parser, default_value_t = DEFAULT_MAX_DEPTH)]
    depth: u32,

    /// Maximum number of concurrent fetches (unbounded when omitted)
    #[clap(short, long, value_parser)]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[clap(short, long, value_parser, default_value_t = 10)]
    timeout: u64,

    /// Only follow links on the starting page's domain
    #[clap(long)]
    same_domain: bool,

    /// Crawl the built-in golang.org sample graph instead of the network
    #[clap(long)]
    sample: bool,
}

impl Args {
    fn config(&self) -> CrawlConfig {
        CrawlConfig {
            max_depth: self.depth,
            max_concurrency: self.concurrency,
        }
    }
}

fn print_report(report: &CrawlReport) {
    for page in &report.pages {
        println!("Visited URL: {} (depth {})", page.url, page.depth);
        for link in &page.links {
            println!("    {}", link);
        }
    }
    for failure in &report.failures {
        println!("Failed URL: {}: {}", failure.url, failure.error);
    }
    println!(
        "{} pages visited, {} fetched, {} failed",
        report.visited().len(),
        report.pages.len(),
        report.failures.len()
    );
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();

    let args = Args::parse();
    let config = args.config();

    let report = if args.sample {
        let root = args
            .url
            .as_ref()
            .map_or_else(|| SAMPLE_ROOT.to_owned(), Url::to_string);
        Crawler::new(StaticFetcher::sample())
            .with_config(config)
            .crawl(root)
            .await
    } else {
        let url = match args.url {
            Some(url) => url,
            None => eyre::bail!("A starting URL is required"),
        };
        let mut fetcher = HttpFetcher::new(Duration::from_secs(args.timeout))?;
        if args.same_domain {
            match url.domain() {
                Some(domain) => fetcher = fetcher.same_domain(domain),
                None => eyre::bail!("URL should have a valid DNS domain"),
            }
        }
        Crawler::new(fetcher)
            .with_config(config)
            .crawl(url.to_string())
            .await
    };

    print_report(&report);

    Ok(())
}
