pub mod config;
pub mod finding_aid;
pub mod model;
pub mod reconcile;
pub mod search;
pub mod storage;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use config::CatalogConfig;
use reconcile::{ImportReport, ReconciliationEngine, SynthesisReport};
use search::facets::FacetCache;
use search::query::{Coverage, SearchConfig, SearchExecutor, SortDirection, SortField};
use storage::sqlite::SqliteStorage;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "archive-catalog",
    version,
    about = "Search and finding-aid reconciliation for a partially digitized archive"
)]
pub struct Cli {
    /// Path to the SQLite database (defaults to <data-dir>/catalog.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// TOML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search records; prints JSON
    Search(SearchArgs),
    /// Print facet counts as JSON
    Facets,
    /// Parse a finding-aid guide, import it, and rebuild placeholders
    ImportGuide {
        /// Plain-text guide file
        path: PathBuf,

        /// Reconcile policy TOML (overrides config)
        #[arg(long)]
        policy: Option<PathBuf>,
    },
    /// Report finding-aid holdings missing from the digitized collection
    Coverage,
    /// Print one record as JSON
    Record {
        #[arg(allow_negative_numbers = true)]
        id: i64,

        /// Treat <id> as the catalog's external id instead of the store id
        #[arg(long)]
        external: bool,
    },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Free-text query (boolean syntax unless --fuzzy or --regex)
    pub query: Option<String>,

    /// Substring match on any word of two or more characters
    #[arg(long)]
    pub fuzzy: bool,

    /// Treat the query as a case-insensitive regular expression
    #[arg(long)]
    pub regex: bool,

    #[arg(long)]
    pub series: Option<String>,

    #[arg(long = "type")]
    pub item_type: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub language: Option<String>,

    /// Earliest sort date, inclusive
    #[arg(long)]
    pub from: Option<String>,

    /// Latest sort date, inclusive
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long = "box")]
    pub box_number: Option<i64>,

    #[arg(long = "folder")]
    pub folder_number: Option<i64>,

    /// Required tag; repeat for several
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// digitized | missing | all
    #[arg(long, default_value = "digitized")]
    pub coverage: Coverage,

    /// date_sort, title, series, item_type, id, box_number, folder_number, archive_order
    #[arg(long, default_value = "date_sort")]
    pub sort: String,

    /// asc | desc
    #[arg(long, default_value = "desc")]
    pub order: String,

    #[arg(long, default_value_t = search::query::DEFAULT_LIMIT)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

impl SearchArgs {
    pub fn to_config(&self) -> SearchConfig {
        SearchConfig {
            query: self.query.clone(),
            fuzzy: self.fuzzy,
            use_regex: self.regex,
            series: self.series.clone(),
            item_type: self.item_type.clone(),
            analysis_model: self.model.clone(),
            language: self.language.clone(),
            date_from: self.from.clone(),
            date_to: self.to.clone(),
            box_number: self.box_number,
            folder_number: self.folder_number,
            tags: self.tags.clone(),
            coverage: self.coverage,
            sort_by: SortField::from_name(&self.sort),
            sort_order: SortDirection::from_name(&self.order),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Serialize)]
struct GuideImportOutput {
    guide: PathBuf,
    import: ImportReport,
    synthesis: SynthesisReport,
    total_records: i64,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    run_with(cli)
}

pub fn run_with(cli: Cli) -> Result<()> {
    let mut config = CatalogConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }

    let db_path = config.db_path();
    tracing::debug!(db = %db_path.display(), "opening catalog");
    let mut storage = SqliteStorage::open(&db_path)?;

    match cli.command {
        Commands::Search(args) => {
            let results = SearchExecutor::new(&storage).search(&args.to_config())?;
            print_json(&results)
        }
        Commands::Facets => {
            let cache = FacetCache::new(config.facet_ttl());
            print_json(&*cache.facets(&storage)?)
        }
        Commands::ImportGuide { path, policy } => {
            if policy.is_some() {
                config.policy_path = policy;
            }
            let output = import_guide(&mut storage, &config, &path)?;
            print_json(&output)
        }
        Commands::Coverage => print_json(&storage.missing_from_collection()?),
        Commands::Record { id, external } => {
            let record = if external {
                storage.get_record_by_external_id(id)?
            } else {
                storage.get_record(id)?
            };
            let record = record.ok_or_else(|| anyhow!("record {id} not found"))?;
            print_json(&record)
        }
    }
}

fn import_guide(
    storage: &mut SqliteStorage,
    config: &CatalogConfig,
    path: &Path,
) -> Result<GuideImportOutput> {
    let engine = ReconciliationEngine::new(config.load_policy()?);

    let guide = finding_aid::parse_guide_file(path)?;
    let mut import = engine.reconcile(storage, &guide.boxes, &guide.folders)?;
    // Guide lines rejected by the parser come first, in line order.
    let mut skipped = guide.skipped;
    skipped.append(&mut import.skipped);
    import.skipped = skipped;
    let synthesis = engine.synthesize_missing_placeholders(storage)?;

    let total_records = storage.count_records()?;

    Ok(GuideImportOutput {
        guide: path.to_path_buf(),
        import,
        synthesis,
        total_records,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{out}");
    Ok(())
}
