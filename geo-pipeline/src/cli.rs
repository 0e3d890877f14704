//! Définition et implémentation des commandes CLI
//!
//! - `geocode` : adresses → snapshot brut (`raw/`)
//! - `clean` : snapshot brut → snapshot nettoyé (`processed/`)
//! - `quality` : snapshot nettoyé → rapport Markdown (`reports/`)
//! - `inspect` : résumé d'un snapshot, avec filtres
//! - `run` : les trois premières étapes à la suite

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use geo_pipeline::dataset::snapshot;
use geo_pipeline::pipeline::{self, read_addresses};
use geo_pipeline::{Dataset, Filter, NumericStrategy, PipelineConfig, QualityAnalyzer, QualityReport};
use geoapi::{AdresseFetcher, CommuneFetcher, Fetcher, RetryPolicy};
use tracing::{info, warn};

/// Nom de base du rapport de qualité
const DEFAULT_REPORT_NAME: &str = "geo_quality_report";

#[derive(Subcommand)]
pub enum Commands {
    /// Geocode a list of addresses with the BAN (one address per line)
    Geocode {
        /// Text file with one address per line ('#' starts a comment)
        #[arg(short, long)]
        input: PathBuf,

        /// Maximum number of addresses (défaut : max_items de la config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Join each valid result with its commune (population, département)
        #[arg(long)]
        enrich: bool,
    },

    /// Clean a raw snapshot (duplicates, missing values, derived columns)
    Clean {
        /// Snapshot file or directory (défaut : data/raw)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Fill strategy for numeric columns: median, mean, zero, none
        #[arg(long, default_value = "median")]
        numeric_strategy: NumericStrategy,

        /// Placeholder for missing text values
        #[arg(long, default_value = geo_pipeline::transform::DEFAULT_PLACEHOLDER)]
        placeholder: String,
    },

    /// Grade a snapshot and write a Markdown quality report
    Quality {
        /// Snapshot file or directory (défaut : data/processed)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Report base name
        #[arg(long, default_value = DEFAULT_REPORT_NAME)]
        name: String,
    },

    /// Print a summary of a snapshot
    Inspect {
        /// Snapshot file or directory (défaut : data/processed)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Row filter, column=value or column=v1,v2 (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<Filter>,
    },

    /// Geocode, clean and grade in one go
    Run {
        /// Text file with one address per line
        #[arg(short, long)]
        input: PathBuf,

        /// Maximum number of addresses (défaut : max_items de la config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Join each valid result with its commune
        #[arg(long)]
        enrich: bool,

        /// Fill strategy for numeric columns: median, mean, zero, none
        #[arg(long, default_value = "median")]
        numeric_strategy: NumericStrategy,

        /// Placeholder for missing text values
        #[arg(long, default_value = geo_pipeline::transform::DEFAULT_PLACEHOLDER)]
        placeholder: String,

        /// Report base name
        #[arg(long, default_value = DEFAULT_REPORT_NAME)]
        name: String,
    },
}

/// Exécute la commande geocode, retourne le snapshot écrit
pub async fn cmd_geocode(
    config: &PipelineConfig,
    input: &Path,
    limit: Option<usize>,
    enrich: bool,
) -> Result<PathBuf> {
    let mut addresses = read_addresses(input)?;
    if addresses.is_empty() {
        anyhow::bail!("No address in {}", input.display());
    }

    let limit = limit.unwrap_or(config.max_items);
    if addresses.len() > limit {
        warn!(total = addresses.len(), limit, "Address list truncated");
        addresses.truncate(limit);
    }

    let mut fetcher = AdresseFetcher::with_config(config.adresse_api(), RetryPolicy::default())?;
    info!(
        api = fetcher.engine().config().name(),
        count = addresses.len(),
        "Geocoding"
    );

    let results = pipeline::geocode(&mut fetcher, addresses, config.batch_size)
        .await
        .context("Geocoding failed")?;
    print_stats("Geocoding", &fetcher);

    let (dataset, base) = if enrich {
        let mut communes = CommuneFetcher::with_config(config.commune_api(), RetryPolicy::default())?;
        let enriched = pipeline::enrich(&mut communes, &results)
            .await
            .context("Commune enrichment failed")?;
        print_stats("Communes", &communes);
        (Dataset::from_enriched(&enriched), "enriched")
    } else {
        (Dataset::from_geocoding(&results), "geocoded")
    };

    let path = snapshot::write_snapshot(&dataset, &config.raw_dir(), base)?;
    println!("Raw snapshot: {} ({} rows)", path.display(), dataset.n_rows());
    Ok(path)
}

/// Exécute la commande clean, retourne le snapshot écrit
pub fn cmd_clean(
    config: &PipelineConfig,
    input: Option<&Path>,
    numeric: NumericStrategy,
    placeholder: &str,
) -> Result<PathBuf> {
    let raw_dir = config.raw_dir();
    let dataset = load_input(input.unwrap_or(&raw_dir))?;
    let initial = dataset.n_rows();

    let (cleaned, log) = pipeline::clean(
        dataset,
        numeric,
        placeholder,
        config.thresholds.geocoding_score_min,
    )?;

    println!("\n--- TRANSFORMATIONS ({}) ---", log.len());
    println!("{}", log.summary());

    let path = snapshot::write_snapshot(&cleaned, &config.processed_dir(), "cleaned")?;
    println!(
        "\nCleaned snapshot: {} ({} → {} rows)",
        path.display(),
        initial,
        cleaned.n_rows()
    );
    Ok(path)
}

/// Exécute la commande quality, retourne le rapport
pub fn cmd_quality(config: &PipelineConfig, input: Option<&Path>, name: &str) -> Result<QualityReport> {
    let processed_dir = config.processed_dir();
    let dataset = load_input(input.unwrap_or(&processed_dir))?;

    let report = QualityAnalyzer::with_thresholds(dataset, config.thresholds).report()?;
    report.display();

    let path = report.write_markdown(&config.reports_dir(), name)?;
    println!("Report: {}", path.display());
    info!("{}", report.summary());
    Ok(report)
}

/// Exécute la commande inspect
pub fn cmd_inspect(config: &PipelineConfig, input: Option<&Path>, filters: &[Filter]) -> Result<()> {
    let processed_dir = config.processed_dir();
    let dataset = load_input(input.unwrap_or(&processed_dir))?;

    let dataset = if filters.is_empty() {
        dataset
    } else {
        let filtered = dataset.filter(filters);
        info!(before = dataset.n_rows(), after = filtered.n_rows(), "Filters applied");
        filtered
    };

    print!("{}", dataset.summary());
    Ok(())
}

/// Exécute tout le pipeline
pub async fn cmd_run(
    config: &PipelineConfig,
    input: &Path,
    limit: Option<usize>,
    enrich: bool,
    numeric: NumericStrategy,
    placeholder: &str,
    name: &str,
) -> Result<()> {
    let raw = cmd_geocode(config, input, limit, enrich).await?;
    let cleaned = cmd_clean(config, Some(raw.as_path()), numeric, placeholder)?;
    let report = cmd_quality(config, Some(cleaned.as_path()), name)?;

    if !report.metrics.is_acceptable() {
        warn!(grade = %report.metrics.quality_grade, "Dataset quality below acceptable grade");
    }
    Ok(())
}

/// Charge un snapshot (fichier) ou un dossier de snapshots
fn load_input(path: &Path) -> Result<Dataset> {
    let dataset = if path.is_dir() {
        snapshot::load_dir(path)
    } else {
        snapshot::load_file(path)
    };
    dataset.with_context(|| format!("Failed to load dataset from {}", path.display()))
}

fn print_stats<F: Fetcher>(label: &str, fetcher: &F) {
    let stats = fetcher.stats();
    let duration = stats
        .duration()
        .map(|d| format!("{:.2}s", d.num_milliseconds() as f64 / 1000.0))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}: {} requests, {} failed, {} items in {}",
        label, stats.requests_made, stats.requests_failed, stats.items_fetched, duration
    );
}
