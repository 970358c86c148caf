mod viewer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use recapfeed::config::{self, Config};
use recapfeed::feed::{FeedController, FeedSnapshot};
use recapfeed::fetcher::GraphQlFetcher;
use recapfeed::layout::{HomeLayout, LoadControl};
use recapfeed::models::{Brand, InitialPage, PostSummary, Publication};
use recapfeed::snapshot::SnapshotStore;

#[derive(Parser)]
#[command(name = "recapfeed")]
#[command(about = "Read a Hashnode publication's recaps from the terminal", long_about = None)]
struct Cli {
    /// Publication host, e.g. recap.example.dev
    #[arg(long, global = true)]
    host: Option<String>,
    /// GraphQL endpoint of the content API
    #[arg(long, global = true)]
    endpoint: Option<String>,
    #[arg(long, global = true, value_parser = config::parse_page_size)]
    page_size: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the first page and store it as the build-time snapshot
    Build,
    /// Print the home page layout
    Show {
        /// Pages to load beyond the first one
        #[arg(short, long, default_value_t = 0)]
        load_pages: u32,
    },
    /// Browse the feed interactively
    Browse,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let page_size = cli.page_size.map(|s| s.to_string());
    let config = Config::from_env_with(|key| match key {
        "HASHNODE_PUBLICATION_HOST" => cli.host.clone(),
        "HASHNODE_GQL_ENDPOINT" => cli.endpoint.clone(),
        "RECAPFEED_PAGE_SIZE" => page_size.clone(),
        _ => None,
    })?;

    let store = match &config.data_dir {
        Some(dir) => SnapshotStore::at(dir)?,
        None => SnapshotStore::new()?,
    };
    let fetcher = GraphQlFetcher::new(&config.endpoint, &config.publication_host)?;

    match cli.command {
        Commands::Build => {
            let initial = fetcher
                .fetch_initial(config.page_size)
                .await
                .with_context(|| {
                    format!("Failed to fetch first page for {}", config.publication_host)
                })?;
            store.store(&config.publication_host, &initial)?;
            println!(
                "Stored first page for {}: {} posts",
                config.publication_host,
                initial.page.posts.len()
            );
        }
        Commands::Show { load_pages } => {
            let InitialPage { publication, page } = first_page(&config, &store, &fetcher).await?;
            let controller = FeedController::new(fetcher, config.page_size, page);

            for _ in 0..load_pages {
                let result = match LoadControl::for_snapshot(&controller.snapshot()) {
                    LoadControl::Button => controller.request_load_more().await,
                    LoadControl::Sentinel => controller.notify_viewport_entered().await,
                    LoadControl::None => break,
                };
                if let Err(e) = result {
                    eprintln!("  ✗ Failed to load more recaps: {}", e);
                    break;
                }
            }

            print_home(&publication, &controller.snapshot());
        }
        Commands::Browse => {
            let InitialPage { publication, page } = first_page(&config, &store, &fetcher).await?;
            let controller = Arc::new(FeedController::new(fetcher, config.page_size, page));
            let runtime = tokio::runtime::Handle::current();

            let browser = move || viewer::run_browser(controller, publication, runtime);
            tokio::task::spawn_blocking(browser)
                .await
                .context("Feed browser panicked")??;
        }
    }

    Ok(())
}

/// Returns the stored first page while it is fresh, regenerating it otherwise.
/// Falls back to a stale snapshot when the content API is unreachable.
async fn first_page(
    config: &Config,
    store: &SnapshotStore,
    fetcher: &GraphQlFetcher,
) -> Result<InitialPage> {
    let host = &config.publication_host;
    if let Some(initial) = store.load_fresh(host, config.revalidate)? {
        return Ok(initial);
    }

    match fetcher.fetch_initial(config.page_size).await {
        Ok(initial) => {
            store.store(host, &initial)?;
            Ok(initial)
        }
        Err(e) => match store.load(host)? {
            Some(stale) => {
                warn!(
                    host = %host,
                    error = %e,
                    generated_at = %stale.generated_at,
                    "serving stale first page"
                );
                Ok(stale.initial)
            }
            None => Err(e).with_context(|| format!("Failed to fetch first page for {}", host)),
        },
    }
}

fn print_home(publication: &Publication, snapshot: &FeedSnapshot) {
    println!("{}", publication.page_title());
    println!("{}\n", publication.description());

    let layout = HomeLayout::from_posts(&snapshot.posts);
    let Some(hero) = layout.hero else {
        println!("Hang tight! We're drafting the first recap..\n");
        print_footer(publication);
        return;
    };

    println!("Latest Recaps\n");
    print_post(publication, "★", hero, true);
    for post in layout.secondary {
        print_post(publication, "•", post, true);
    }
    if !layout.more.is_empty() {
        println!("More recaps\n");
        for post in layout.more {
            print_post(publication, "-", post, false);
        }
    }

    match LoadControl::for_snapshot(snapshot) {
        LoadControl::Button => println!("[ Load more recaps ]  (rerun with --load-pages)\n"),
        LoadControl::Sentinel => println!("… more recaps available (--load-pages)\n"),
        LoadControl::None => {}
    }

    print_footer(publication);
}

fn print_footer(publication: &Publication) {
    println!("────────────────────────────────────────");
    match publication.brand() {
        Brand::Logo { src, alt } => println!("{}  [logo: {}]", alt, src),
        Brand::Title(title) => println!("{}", title),
    }
}

fn print_post(
    publication: &Publication,
    marker: &str,
    post: &PostSummary,
    with_brief: bool,
) {
    println!(
        "{} {}  ({})",
        marker,
        post.title,
        post.published_at.format("%b %d, %Y")
    );
    println!("  {}", publication.post_url(post));
    if with_brief && !post.brief.is_empty() {
        let options = textwrap::Options::new(78)
            .initial_indent("  ")
            .subsequent_indent("  ");
        println!("{}", textwrap::fill(&post.brief, options));
    }
    println!();
}
