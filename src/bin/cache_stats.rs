use clap::Parser;
use std::path::PathBuf;
use wikiroute::cache::AdjacencyCache;
use wikiroute::Config;

#[derive(Parser, Debug)]
#[command(name = "cache-stats")]
#[command(about = "Summarize the adjacency records in the WikiRoute cache directory")]
struct Args {
    /// Cache directory (defaults to the configured one)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    config.logger().init();

    let dir = args.cache_dir.unwrap_or_else(|| config.cache_dir().to_path_buf());

    if !dir.is_dir() {
        anyhow::bail!("Cache directory does not exist: {}", dir.display());
    }

    let cache = AdjacencyCache::open(&dir, 0)?;
    let stats = cache.stats().await?;

    println!("\n=== WikiRoute Cache Statistics ===\n");
    println!("Directory:      {}", dir.display());
    println!("Articles:       {}", stats.records);
    println!("Total links:    {}", stats.total_links);
    if stats.records > 0 {
        println!(
            "Avg out-degree: {:.1}",
            stats.total_links as f64 / stats.records as f64
        );
    }
    if stats.corrupt > 0 {
        println!("\n⚠️  {} unreadable record(s); delete them to refetch", stats.corrupt);
    }

    Ok(())
}
