mod classify;
mod database;
mod error;
mod ingest;
mod mapping;
mod media;
mod report;
mod utils;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::classify::completion::OpenAiCompletion;
use crate::classify::image::ImageCategorizer;
use crate::classify::text::{self, TextCategorizer};
use crate::database::repo::CatalogStore;
use crate::ingest::records;
use crate::mapping::export;
use crate::mapping::schema_mapper::{categorize_guides, SchemaMapper};
use crate::media::organizer;
use crate::media::report::ClassificationReport;
use crate::report::comparator::{self, SourceData};
use crate::utils::config::{DataPaths, Mode, PipelineConfig, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Classification and schema mapping for Arduino guide content", long_about = None)]
struct Cli {
    /// Root of the data directory layout
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    /// JSON file overriding keyword rules, column tokens and fallbacks
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fail on missing input instead of synthesizing defaults
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Map raw records into devices, components, guides and steps
    Map {
        #[arg(short, long)]
        input: PathBuf,
        /// Creation date stamped on guides (YYYY-MM-DD), defaults to today
        #[arg(long)]
        created_date: Option<NaiveDate>,
        /// Also persist the mapped entities into this SQLite file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Label search results by text category
    ClassifyText {
        /// Defaults to <data-dir>/raw/search_results.json
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Defaults to <data-dir>/processed/classified_text.json
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Ask the completion service first, falling back to keywords
        #[arg(long)]
        delegate: bool,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Classify images and copy them into per-category directories
    ClassifyImages {
        /// Defaults to <data-dir>/scraped_images
        #[arg(short, long)]
        source: Option<PathBuf>,
        /// Defaults to <data-dir>/classified_images
        #[arg(short, long)]
        dest: Option<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Compare category distributions of two labelled datasets
    Compare {
        /// Defaults to <data-dir>/raw/scraped_data.json
        #[arg(long)]
        first: Option<PathBuf>,
        /// Defaults to <data-dir>/processed/classified_text.json
        #[arg(long)]
        second: Option<PathBuf>,
        /// Defaults to <data-dir>/processed/comparison_results.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print row counts of a catalog database
    Stats {
        #[arg(long)]
        db: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mode = Mode::from_flag(cli.strict);
    let config = PipelineConfig::load(cli.config.as_deref())?;
    let paths = DataPaths::new(&cli.data_dir);

    match cli.command {
        Commands::Map {
            input,
            created_date,
            db,
        } => run_map(&config, &paths, mode, &input, created_date, db.as_deref()),
        Commands::ClassifyText {
            input,
            output,
            delegate,
            db,
        } => {
            let input = input.unwrap_or_else(|| paths.raw.join("search_results.json"));
            let output = output.unwrap_or_else(|| paths.processed.join("classified_text.json"));
            run_classify_text(&config, mode, &input, &output, delegate, db.as_deref())
        }
        Commands::ClassifyImages { source, dest, db } => {
            let source = source.unwrap_or_else(|| paths.scraped_images.clone());
            let dest = dest.unwrap_or_else(|| paths.classified_images.clone());
            run_classify_images(&config, &paths, mode, &source, &dest, db.as_deref())
        }
        Commands::Compare {
            first,
            second,
            output,
        } => {
            let first = first.unwrap_or_else(|| paths.raw.join("scraped_data.json"));
            let second = second.unwrap_or_else(|| paths.processed.join("classified_text.json"));
            let output = output.unwrap_or_else(|| paths.processed.join("comparison_results.json"));
            run_compare(mode, &first, &second, &output)
        }
        Commands::Stats { db } => {
            let store = CatalogStore::open(&db)?;
            let counts = store.counts()?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
            Ok(())
        }
    }
}

fn run_map(
    config: &PipelineConfig,
    paths: &DataPaths,
    mode: Mode,
    input: &Path,
    created_date: Option<NaiveDate>,
    db: Option<&Path>,
) -> Result<()> {
    paths.ensure_dirs()?;
    let raw = records::load_records(input)?;
    info!("Loaded {} raw records from {:?}", raw.len(), input);

    let mut mapper = SchemaMapper::from_config(config, mode);
    if let Some(date) = created_date {
        mapper = mapper.with_created_date(date);
    }
    let mut schema = mapper.map(&raw)?;

    let categorizer = TextCategorizer::new(&config.text_rules)?;
    categorize_guides(&mut schema, &categorizer);

    export::write_outputs(&schema, &paths.processed, &paths.outputs)?;

    if let Some(db) = db {
        let mut store = CatalogStore::open(db)?;
        store.insert_schema(&schema)?;
        info!("Persisted mapped entities to {:?}", db);
    }
    Ok(())
}

fn build_text_categorizer(config: &PipelineConfig, delegate: bool) -> Result<TextCategorizer> {
    let categorizer = TextCategorizer::new(&config.text_rules)?;
    if !delegate {
        return Ok(categorizer);
    }

    let settings = Settings::load();
    match OpenAiCompletion::from_settings(&settings) {
        Ok(client) => {
            info!("Delegated classification enabled ({})", settings.openai_model);
            Ok(categorizer.with_delegate(Box::new(client)))
        }
        Err(e) => {
            warn!("Delegated classification unavailable ({}), using keywords", e);
            Ok(categorizer)
        }
    }
}

fn run_classify_text(
    config: &PipelineConfig,
    mode: Mode,
    input: &Path,
    output: &Path,
    delegate: bool,
    db: Option<&Path>,
) -> Result<()> {
    let categorizer = build_text_categorizer(config, delegate)?;
    let batch = text::classify_file(&categorizer, input, &config.text_source, mode)?;
    if batch.placeholder {
        warn!("Results were produced from placeholder data");
    }

    write_json(output, &batch.items)?;
    info!(
        "Saved {} classified items to {:?} (delegated: {})",
        batch.items.len(),
        output,
        categorizer.is_delegated()
    );
    text::log_distribution(&batch.items);

    if let Some(db) = db {
        let mut store = CatalogStore::open(db)?;
        let written = store.insert_classified_texts(&batch.items)?;
        info!("Persisted {} classified guides to {:?}", written, db);
    }
    Ok(())
}

fn run_classify_images(
    config: &PipelineConfig,
    paths: &DataPaths,
    mode: Mode,
    source: &Path,
    dest: &Path,
    db: Option<&Path>,
) -> Result<()> {
    let categorizer = ImageCategorizer::new(&config.image_rules);
    let images = organizer::organize(&categorizer, source, dest, mode)?;

    if let Some(db) = db {
        let mut store = CatalogStore::open(db)?;
        let written = store.insert_images(&images)?;
        info!("Persisted {} image records to {:?}", written, db);
    }

    let report = ClassificationReport::new(images, categorizer.categories());
    report.save(&paths.image_sources)?;
    report.log_summary();
    Ok(())
}

fn run_compare(mode: Mode, first: &Path, second: &Path, output: &Path) -> Result<()> {
    let first = SourceData::load("scraper", first, comparator::placeholder_scraper_data, mode)?;
    let second = SourceData::load(
        "classified",
        second,
        comparator::placeholder_classified_data,
        mode,
    )?;

    let report = comparator::compare(&first, &second);
    if report.used_placeholder_data {
        warn!("Comparison includes placeholder data");
    }
    write_json(output, &report)?;
    info!("Saved comparison results to {:?}", output);
    comparator::log_summary(&report);
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
