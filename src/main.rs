use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use subharvest::config::AppConfig;
use subharvest::frontier::Frontier;
use subharvest::logging::{init_logging, OperationTimer};
use subharvest::metrics::HarvestMetrics;
use subharvest::reddit::RedditClient;
use subharvest::validation::InputValidator;
use subharvest::{BatchReport, Database, FileStore, HarvestService, HarvestStore};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Where harvested records are stored
    #[arg(long, value_enum, global = true, default_value_t = StoreKind::Sqlite)]
    store: StoreKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    /// SQLite database at `database.url`
    Sqlite,
    /// CSV tables under `files.directory`
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect communities; without names, collect the unexplored frontier
    Collect {
        /// Community names, with or without a leading r/
        communities: Vec<String>,
    },
    /// Resume communities holding too few submissions
    Complete {
        /// Stored submissions a community needs to count as complete
        #[arg(long)]
        min_submissions: Option<usize>,
    },
    /// Collect the frontier repeatedly, following new cross-posts
    Explore {
        /// Number of exploration rounds
        #[arg(long, default_value_t = 1)]
        rounds: usize,
    },
    /// Show unexplored and incomplete communities
    Frontier {
        /// Stored submissions a community needs to count as complete
        #[arg(long)]
        min_submissions: Option<usize>,
    },
    /// Import CSV tables into the SQLite database
    Import {
        /// Directory holding the CSV tables
        #[arg(long)]
        from: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials usually live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _log_guard = init_logging(Some(&config.get_log_level()), log_file, &config.logging.format)?;
    HarvestMetrics::describe();

    info!("Starting subharvest");

    match cli.command {
        Commands::Collect { communities } => {
            let targets = (!communities.is_empty()).then_some(communities);
            let service = build_service(&config, cli.store)?;
            report(&service.collect_communities(targets).await?)
        },
        Commands::Complete { min_submissions } => {
            let min = min_submissions.unwrap_or(config.collection.min_submissions);
            InputValidator::validate_submissions_limit(min)?;
            let service = build_service(&config, cli.store)?;
            report(&service.complete_collection(min).await?)
        },
        Commands::Explore { rounds } => {
            InputValidator::validate_rounds(rounds)?;
            let service = build_service(&config, cli.store)?;
            report(&service.explore(rounds).await?)
        },
        Commands::Frontier { min_submissions } => {
            let min = min_submissions.unwrap_or(config.collection.min_submissions);
            let store = open_store(&config, cli.store)?;
            show_frontier(store.as_ref(), min)
        },
        Commands::Import { from } => import_files(&config, &from),
    }
}

fn open_store(config: &AppConfig, kind: StoreKind) -> Result<Box<dyn HarvestStore>> {
    Ok(match kind {
        StoreKind::Sqlite => Box::new(Database::with_max_connections(
            &config.database.url,
            config.database.max_connections,
        )?),
        StoreKind::Csv => {
            let directory = Path::new(&config.files.directory);
            InputValidator::validate_file_path(directory)?;
            Box::new(FileStore::open(directory)?)
        },
    })
}

fn build_service(config: &AppConfig, kind: StoreKind) -> Result<HarvestService<RedditClient, Box<dyn HarvestStore>>> {
    let source = RedditClient::new(&config.reddit)?;
    let store = open_store(config, kind)?;
    Ok(HarvestService::new(
        source,
        store,
        config.collector_settings(),
        config.collection.batch_policy,
    ))
}

/// Log the outcome of a batch; any failure fails the process
fn report(report: &BatchReport) -> Result<()> {
    info!(
        collected = report.collected.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        halted = report.halted,
        "Run complete"
    );
    for failure in &report.failures {
        warn!(community = %failure.community, error = ?failure.error, "Not collected");
    }

    if report.failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} of {} communities failed", report.failures.len(), report.attempted())
    }
}

fn show_frontier(store: &dyn HarvestStore, min_submissions: usize) -> Result<()> {
    let frontier = Frontier::new(store);

    let unexplored = frontier.unexplored_communities()?;
    info!("Unexplored communities: {}", unexplored.len());
    for name in &unexplored {
        info!("  {}", name);
    }

    let incomplete = frontier.incomplete_communities(min_submissions)?;
    info!("Communities below {} submissions: {}", min_submissions, incomplete.len());
    for community in &incomplete {
        info!("  {} ({} stored, last {})", community.name, community.offset, community.last_submission_id);
    }

    Ok(())
}

/// Copy every CSV record into the SQLite database
fn import_files(config: &AppConfig, from: &Path) -> Result<()> {
    InputValidator::validate_file_path(from)?;
    let timer = OperationTimer::new("import");

    let files = FileStore::open(from).with_context(|| format!("Failed to open {}", from.display()))?;
    let records = files.load_all()?;
    let db = Database::with_max_connections(&config.database.url, config.database.max_connections)?;

    for community in &records.communities {
        db.upsert_community(community)?;
    }
    let submissions = db.upsert_submissions(&records.submissions)?;
    let comments = db.upsert_comments(&records.comments)?;
    let crossposts = db.upsert_crossposts(&records.crossposts)?;

    info!(
        communities = records.communities.len(),
        submissions,
        comments,
        crossposts,
        "Import complete"
    );
    timer.finish();
    Ok(())
}
