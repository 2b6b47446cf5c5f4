use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use wikiroute::cache::AdjacencyCache;
use wikiroute::remote::WikipediaClient;
use wikiroute::search::SearchReport;
use wikiroute::{
    BatchFetcher, CancellationToken, Config, LinkResolver, PathFinder, SearchLimits, SearchOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "wikiroute")]
#[command(version)]
#[command(about = "Find the shortest chain of links between two Wikipedia articles")]
struct Args {
    /// Title of the article to start from
    start: String,

    /// Title of the article to reach
    goal: String,

    /// Concurrent link lookups per batch
    #[arg(short, long)]
    workers: Option<usize>,

    /// Longest path (in links) to consider
    #[arg(long)]
    max_depth: Option<usize>,

    /// Most distinct articles to track before giving up
    #[arg(long)]
    max_visited: Option<usize>,

    /// Adjacency cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Wikipedia language code (e.g. en, nl, de)
    #[arg(short, long)]
    language: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.search.workers = workers;
        }
        if self.max_depth.is_some() {
            config.search.max_depth = self.max_depth;
        }
        if self.max_visited.is_some() {
            config.search.max_visited = self.max_visited;
        }
        if let Some(dir) = &self.cache_dir {
            config.wikiroute.cache_dir = dir.clone();
        }
        if let Some(language) = &self.language {
            config.remote.language = language.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    args.apply(&mut config);
    config.validate()?;

    config.logger().init();

    log::info!("Starting WikiRoute v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Cache directory: {}", config.cache_dir().display());
    log::info!("API endpoint: {}", config.api_url());

    let cache = AdjacencyCache::open(config.cache_dir(), config.cache.memory_capacity)
        .context("Failed to open adjacency cache")?;
    let client = WikipediaClient::from_config(&config)?;
    let resolver = Arc::new(LinkResolver::new(cache, Arc::new(client)));
    let finder = PathFinder::new(BatchFetcher::from_config(resolver.clone(), &config))
        .with_limits(SearchLimits::from_config(&config.search));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, stopping after the current batch");
                cancel.cancel();
            }
        });
    }

    let report = finder
        .find_path(&args.start, &args.goal, &cancel)
        .await
        .context("Search failed")?;

    print_report(&report);

    let stats = resolver.stats();
    log::info!(
        "Lookups: {} cache hits, {} fetched, {} missing, {} degraded",
        stats.cache_hits,
        stats.remote_fetches,
        stats.missing,
        stats.degraded
    );

    Ok(())
}

fn print_report(report: &SearchReport) {
    match &report.outcome {
        SearchOutcome::Found(path) => {
            println!("Shortest route ({} links):", path.len() - 1);
            for (i, title) in path.iter().enumerate() {
                println!("{}. {}", i + 1, title);
            }
        }
        SearchOutcome::NoPath => println!("No path found."),
        SearchOutcome::Canceled => println!("Search canceled."),
        SearchOutcome::LimitReached => println!("Search limit reached without a path."),
    }

    println!(
        "\nVisited {} articles, expanded {} in {} batches ({:?})",
        report.stats.visited, report.stats.expanded, report.stats.batches, report.stats.elapsed
    );
}
