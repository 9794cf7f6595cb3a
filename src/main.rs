//! Course-Harvest main entry point
//!
//! This is the command-line interface for the Course-Harvest catalogue harvester.

use clap::Parser;
use course_harvest::config::{load_config_with_hash, load_default_config, validate, Config};
use course_harvest::crawler::{course_ids_document, CrawlOrchestrator};
use course_harvest::output::{export, print_locations, print_statistics};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Course-Harvest: a resumable course catalogue harvester
///
/// Course-Harvest walks the course catalogue for a search term, pulls course
/// details and historic grade statistics, and caches everything on disk so
/// later runs only fetch what is still missing. Results are exported as CSV.
#[derive(Parser, Debug)]
#[command(name = "course-harvest")]
#[command(version)]
#[command(about = "A resumable course catalogue harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults and environment only if omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Search term to crawl instead of the configured one
    #[arg(short, long, value_name = "TERM")]
    search: Option<String>,

    /// Re-fetch catalogue pages even when cached copies exist
    #[arg(long)]
    refresh_catalogue: bool,

    /// Acquire the courses listed in a cached line-list instead of searching
    #[arg(long, value_name = "NAME", conflicts_with_all = ["rebuild", "list", "dry_run"])]
    from_list: Option<String>,

    /// Rebuild the CSV exports from the cache without network access
    #[arg(long, conflicts_with_all = ["list", "dry_run"])]
    rebuild: bool,

    /// List every cached course and exit
    #[arg(long, conflicts_with = "dry_run")]
    list: bool,

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    if let Some(term) = &cli.search {
        config.crawler.search_term = term.clone();
    }
    if cli.refresh_catalogue {
        config.crawler.refresh_catalogue = true;
    }
    validate(&config)?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.list {
        handle_list(&config)?;
    } else if cli.rebuild {
        handle_rebuild(&config)?;
    } else if let Some(list) = &cli.from_list {
        handle_from_list(&config, list).await?;
    } else {
        handle_crawl(&config).await?;
    }

    Ok(())
}

/// Loads the configuration file if given, logging its hash
fn load(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::info!("No configuration file given, using defaults and environment");
            Ok(load_default_config()?)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("course_harvest=info,warn"),
            1 => EnvFilter::new("course_harvest=debug,info"),
            2 => EnvFilter::new("course_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Course-Harvest Dry Run ===\n");

    println!("Search:");
    println!("  Term: {}", config.crawler.search_term);
    println!("  Destination: {}", config.crawler.destination);
    println!("  Study year: {}", config.crawler.study_year);
    println!("  Predicted grades: {}", config.crawler.predicted_grades.join(", "));
    println!("  Refresh catalogue: {}", config.crawler.refresh_catalogue);

    println!("\nEndpoints:");
    println!("  Catalogue: {}", config.endpoints.catalogue_url);
    println!("  Search API: {}", config.endpoints.search_api_url);
    println!("  Historic API: {}", config.endpoints.historic_api_url);

    println!("\nFetcher:");
    println!("  User agent: {}", config.user_agent.header_value());
    println!("  Max retries: {}", config.fetcher.max_retries);
    println!("  Timeout: {}ms", config.fetcher.timeout_ms);
    println!("  Retry delay: {}ms", config.fetcher.retry_delay_ms);
    println!("  Error ledger: {}", config.fetcher.error_log_path.display());

    println!("\nRate Limits ({}):", config.rate_limits.0.len());
    for (name, limit) in &config.rate_limits.0 {
        println!("  - {}: {} requests / {}s", name, limit.requests, limit.seconds);
    }

    println!("\nCache:");
    println!("  Current: {}", config.cache.current_root().display());
    for root in config.cache.fallback_roots() {
        println!("  Fallback: {}", root.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --list mode: prints every cached course location
fn handle_list(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = CrawlOrchestrator::new(config)?;
    print_locations(&orchestrator.list_cached());
    orchestrator.close();
    Ok(())
}

/// Handles the --rebuild mode: writes the exports from the cache alone
fn handle_rebuild(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = CrawlOrchestrator::new(config)?;
    export_from_cache(&orchestrator, config)?;
    orchestrator.close();
    Ok(())
}

/// Handles the --from-list mode: acquires every course in a cached list
async fn handle_from_list(config: &Config, list: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut orchestrator = CrawlOrchestrator::new(config)?;

    let report = match orchestrator.acquire_from_list(list).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Acquisition from {} failed: {}", list, e);
            orchestrator.close();
            return Err(e.into());
        }
    };

    export_from_cache(&orchestrator, config)?;
    let fetch = orchestrator.close();
    print_statistics(&report.summary, &fetch);
    Ok(())
}

/// Handles the default mode: crawls the search term, then exports
async fn handle_crawl(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let term = config.crawler.search_term.clone();
    let mut orchestrator = CrawlOrchestrator::new(config)?;

    tracing::info!("Starting harvest for {:?}", term);

    let report = match orchestrator.crawl(&term).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            orchestrator.close();
            return Err(e.into());
        }
    };

    tracing::info!(
        "Course ids written to {}",
        orchestrator
            .store()
            .current_root()
            .join(format!("{}.txt", course_ids_document(&term)))
            .display()
    );

    export_from_cache(&orchestrator, config)?;
    let fetch = orchestrator.close();
    print_statistics(&report.summary, &fetch);
    Ok(())
}

fn export_from_cache(
    orchestrator: &CrawlOrchestrator,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let rebuild = orchestrator.rebuild();
    let paths = export(orchestrator.store(), &config.output, &rebuild)?;

    tracing::info!("Courses exported to {}", paths.courses.display());
    if let Some(path) = paths.confirmation_rates {
        tracing::info!("Confirmation rates exported to {}", path.display());
    }

    Ok(())
}
