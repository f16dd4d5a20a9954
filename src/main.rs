//! SiteGraph main entry point
//!
//! This is the command-line front-end for crawling a site into its page and
//! link graph, checking crawl status, and listing stored pages.

use anyhow::{bail, Context};
use clap::Parser;
use sitegraph::config::{load_config, Config};
use sitegraph::CrawlService;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SiteGraph: crawl a website into a persistent page and link graph
///
/// SiteGraph fetches a site breadth-first, extracts structured data from
/// every page, and stores pages and their internal links per project.
/// Re-crawling a project updates pages in place and replaces their links.
#[derive(Parser, Debug)]
#[command(name = "sitegraph")]
#[command(version)]
#[command(about = "Crawl a website into a page and link graph", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Project the crawl data belongs to
    #[arg(short, long)]
    project: i64,

    /// Start URL (repeatable); defaults to crawler.start-urls from the config
    #[arg(short, long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Request cap for this crawl; defaults to crawler.max-requests-per-crawl
    #[arg(long, value_name = "N", conflicts_with_all = ["status", "pages"])]
    max_requests: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["status", "pages"])]
    dry_run: bool,

    /// Print the project's crawl status as JSON and exit
    #[arg(long, conflicts_with_all = ["dry_run", "pages"])]
    status: bool,

    /// Print the project's stored pages as JSON and exit
    #[arg(long, conflicts_with_all = ["dry_run", "status"])]
    pages: bool,

    /// Maximum number of pages to print with --pages
    #[arg(long, default_value_t = 100, requires = "pages")]
    limit: u32,

    /// Number of pages to skip with --pages
    #[arg(long, default_value_t = 0, requires = "pages")]
    offset: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config).with_context(|| {
        format!("Failed to load configuration from {}", cli.config.display())
    })?;
    tracing::info!("Configuration loaded successfully");

    let urls = if cli.urls.is_empty() {
        config.crawler.start_urls.clone()
    } else {
        cli.urls.clone()
    };

    if cli.dry_run {
        return handle_dry_run(&config, cli.project, &urls);
    }

    let service = CrawlService::from_config(config)?;

    if cli.status {
        handle_status(&service, cli.project)
    } else if cli.pages {
        handle_pages(&service, cli.project, cli.limit, cli.offset)
    } else {
        handle_crawl(&service, cli.project, urls, cli.max_requests).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitegraph=info,warn"),
            1 => EnvFilter::new("sitegraph=debug,info"),
            2 => EnvFilter::new("sitegraph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, project_id: i64, urls: &[String]) -> anyhow::Result<()> {
    println!("=== SiteGraph Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Max requests per crawl: {}",
        config.crawler.max_requests_per_crawl
    );
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!(
        "  Max concurrent jobs: {}",
        config.crawler.max_concurrent_jobs
    );
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.crawler.request_timeout_secs, config.crawler.connect_timeout_secs
    );

    println!(
        "\nAllowed Domains ({}):",
        config.crawler.allowed_domains.len()
    );
    for pattern in &config.crawler.allowed_domains {
        println!("  - {}", pattern);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("\nDatabase: {}", config.storage.database_path);
    println!(
        "Status freshness window: {}s",
        config.status.freshness_window_secs
    );

    println!("\nProject {} start URLs ({}):", project_id, urls.len());
    for url in urls {
        println!("  * {}", url);
    }

    println!("\n✓ Configuration is valid");
    if urls.is_empty() {
        println!("✗ No start URLs: pass --url or set crawler.start-urls");
    } else {
        println!("✓ Would start crawling with {} start URLs", urls.len());
    }

    Ok(())
}

/// Handles the --status mode
fn handle_status(service: &CrawlService, project_id: i64) -> anyhow::Result<()> {
    let report = service.get_status(project_id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Handles the --pages mode
fn handle_pages(
    service: &CrawlService,
    project_id: i64,
    limit: u32,
    offset: u32,
) -> anyhow::Result<()> {
    let listing = service.list_pages(project_id, limit, offset)?;
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    service: &CrawlService,
    project_id: i64,
    urls: Vec<String>,
    max_requests: Option<u32>,
) -> anyhow::Result<()> {
    if urls.is_empty() {
        bail!(
            "No start URLs for project {}: pass --url or set crawler.start-urls",
            project_id
        );
    }

    let accepted = service.start_with(project_id, urls, max_requests)?;
    tracing::info!(
        "Crawl {} for project {} with {} start URLs (max {} requests)",
        accepted.status,
        accepted.project_id,
        accepted.urls.len(),
        accepted.max_requests
    );

    match accepted.wait().await {
        Ok(summary) => {
            tracing::info!("Crawl completed successfully");
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
