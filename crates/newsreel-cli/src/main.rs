use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use newsreel_client::{ReqwestFetcher, SelectorExtractor, validate_hints, validate_selector};
use newsreel_core::config::{SourceConfig, StrategyRegistry, default_sources, load_sources};
use newsreel_core::models::NewsItem;
use newsreel_core::orchestrator::DEFAULT_MAX_ITEMS;
use newsreel_core::store::ItemFilter;
use newsreel_core::{CrawlOrchestrator, NewsStore, RunSummary};

#[derive(Parser)]
#[command(name = "newsreel", version, about = "Stock news crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Plain HTTP GET, no script execution
    Static,
    /// Headless Chromium render (requires the `browser` build feature)
    Browser,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a crawl over the configured sources and print the items found
    Crawl {
        /// Fetch backend to use
        #[arg(short, long, value_enum, default_value_t = Backend::Static)]
        backend: Backend,

        /// Maximum items kept per source
        #[arg(short, long, default_value_t = DEFAULT_MAX_ITEMS)]
        max_items: usize,

        /// Path to a JSON source file (defaults to the built-in sources)
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Output format for the crawled items
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List configured sources and their extraction strategy coverage
    Sources {
        /// Path to a JSON source file (defaults to the built-in sources)
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Check that every registered selector parses
        #[arg(long, default_value_t = false)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newsreel=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            backend,
            max_items,
            sources,
            format,
        } => cmd_crawl(backend, max_items, sources, format).await?,
        Commands::Sources { sources, validate } => cmd_sources(sources, validate)?,
    }

    Ok(())
}

fn load_configs(path: Option<&PathBuf>, registry: &StrategyRegistry) -> Result<Vec<SourceConfig>> {
    match path {
        Some(p) => load_sources(p, registry)
            .with_context(|| format!("Failed to load sources from {}", p.display())),
        None => Ok(default_sources()),
    }
}

async fn cmd_crawl(
    backend: Backend,
    max_items: usize,
    sources: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let registry = StrategyRegistry::builtin();
    let configs = load_configs(sources.as_ref(), &registry)?;

    let store = NewsStore::new();
    for config in &configs {
        store.upsert_source(config).await;
    }

    let run_id = Uuid::new_v4();
    let summary = match backend {
        Backend::Static => {
            let fetcher = ReqwestFetcher::new().map_err(|e| anyhow::anyhow!(e))?;
            let orchestrator =
                CrawlOrchestrator::new(fetcher, SelectorExtractor::new(), registry, store.clone())
                    .with_max_items(max_items);
            orchestrator.run(run_id, None).await
        }
        #[cfg(feature = "browser")]
        Backend::Browser => {
            let fetcher = newsreel_client::BrowserFetcher::new();
            let orchestrator =
                CrawlOrchestrator::new(fetcher, SelectorExtractor::new(), registry, store.clone())
                    .with_max_items(max_items);
            orchestrator.run(run_id, None).await
        }
        #[cfg(not(feature = "browser"))]
        Backend::Browser => {
            bail!("This build has no browser backend; rebuild with --features browser")
        }
    };

    report_summary(&summary);

    let items = store.list_items(&ItemFilter::default()).await;
    match format {
        OutputFormat::Table => print_table(&items),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Csv => write_csv(&items)?,
    }

    if summary.error_count() > 0 {
        bail!("Crawl finished with {} source error(s)", summary.error_count());
    }
    Ok(())
}

fn report_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match &outcome.error {
            Some(error) => tracing::warn!(source = %outcome.source, %error, "Source failed"),
            None => tracing::info!(
                source = %outcome.source,
                found = outcome.found,
                saved = outcome.saved,
                "Source crawled"
            ),
        }
    }
    tracing::info!(
        run_id = %summary.id,
        status = %summary.status,
        found = summary.total_found(),
        saved = summary.total_saved(),
        "Run finished"
    );
}

fn print_table(items: &[NewsItem]) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }
    for item in items {
        println!(
            "[{}] {} — {}\n    {}",
            item.source,
            item.published_at.format("%Y-%m-%d %H:%M UTC"),
            item.title,
            item.url
        );
    }
    println!("\nTotal: {} items", items.len());
}

fn write_csv(items: &[NewsItem]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(["source", "title", "url", "description", "image_url", "published_at"])?;
    for item in items {
        writer.write_record([
            item.source.as_str(),
            item.title.as_str(),
            item.url.as_str(),
            item.description.as_deref().unwrap_or(""),
            item.image_url.as_deref().unwrap_or(""),
            &item.published_at.to_rfc3339(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn cmd_sources(sources: Option<PathBuf>, validate: bool) -> Result<()> {
    let registry = StrategyRegistry::builtin();
    let configs = load_configs(sources.as_ref(), &registry)?;

    for config in &configs {
        let coverage = if registry.hints_for(&config.name).is_some() {
            "strategy: registered"
        } else {
            "strategy: MISSING (will be skipped)"
        };
        let state = if config.enabled { "enabled" } else { "disabled" };
        println!("{} — {} [{state}, {coverage}]", config.name, config.url);
    }

    if validate {
        let mut bad = 0usize;
        for name in registry.known_names() {
            if let Some(hints) = registry.hints_for(name)
                && let Err(e) = validate_hints(hints)
            {
                eprintln!("{name}: {e}");
                bad += 1;
            }
        }
        // Per-source container overrides are selectors too.
        for config in &configs {
            if let Some(hint) = &config.container_hint
                && let Err(e) = validate_selector(hint)
            {
                eprintln!("{} container_hint: {e}", config.name);
                bad += 1;
            }
        }
        if bad > 0 {
            bail!("{bad} selector set(s) failed validation");
        }
        println!("\nAll configured selectors parse.");
    }

    Ok(())
}
