use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use feedfold::config::{self, Config};
use feedfold::feed::HttpFetcher;
use feedfold::pipeline::{save_store, Pipeline};
use feedfold::shutdown::{Shutdown, Wake};
use feedfold::storage::Store;

/// Newest articles listed per feed by `--summary`.
const SUMMARY_ARTICLES: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "feedfold",
    version,
    about = "Periodically merge RSS and Atom feeds into one JSON store"
)]
struct Args {
    /// Config file (default: ~/.config/feedfold/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Store file, overriding `store_path` from the config
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Print what the store holds after each cycle
    #[arg(long)]
    summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_dir = config::config_dir().context("HOME environment variable not set")?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let urls = config.feed_urls();
    if urls.is_empty() {
        tracing::warn!(
            path = %config_path.display(),
            "No valid feed URLs configured; cycles will be empty"
        );
    }

    let store_path = args
        .store
        .clone()
        .unwrap_or_else(|| config.store_path(&config_dir));
    let mut store = Store::load(&store_path);

    let fetcher =
        HttpFetcher::new(config.fetcher_config()).context("Failed to build HTTP client")?;
    let pipeline = Pipeline::new(fetcher, config.max_concurrent_fetches);

    let interval = if args.once {
        None
    } else {
        config.fetch_interval()
    };

    let mut shutdown = Shutdown::install().context("Failed to install signal handlers")?;

    loop {
        let report = pipeline.run_cycle(&urls, &mut store).await;
        save_store(&store, &store_path);
        if args.summary {
            print_summary(&store, &store_path);
        }
        tracing::debug!(?report, "Cycle report");

        let Some(interval) = interval else {
            break;
        };

        // Signals received mid-cycle stay queued and end this wait
        if shutdown.sleep(interval).await == Wake::Shutdown {
            break;
        }
    }

    Ok(())
}

fn print_summary(store: &Store, path: &Path) {
    println!(
        "{} feeds, {} articles in {}",
        store.len(),
        store.article_count(),
        path.display()
    );

    for feed in store.feeds() {
        println!();
        println!("{}", feed.title.as_deref().unwrap_or("(untitled)"));
        println!("  id:       {}", feed.id);
        println!("  link:     {}", feed.link);
        println!("  updated:  {}", feed.updated.to_rfc3339());
        println!("  articles: {}", feed.articles.len());

        for article in feed.articles_newest_first().into_iter().take(SUMMARY_ARTICLES) {
            println!(
                "    {}  {}",
                article.published.format("%Y-%m-%d %H:%M"),
                article
                    .title
                    .as_deref()
                    .or(article.link.as_deref())
                    .unwrap_or(&article.id)
            );
        }
    }
}
