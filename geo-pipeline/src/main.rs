//! Point d'entrée CLI pour geo-pipeline

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use geo_pipeline::PipelineConfig;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Charge `.env` (URLs d'API, dossier des données), sinon celui placé à côté
/// du binaire
fn load_env() {
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Géocoder, nettoyer et noter des adresses françaises
#[derive(Parser)]
#[command(name = "geo-pipeline")]
#[command(author, version)]
#[command(about = "Géocoder des adresses via la BAN, nettoyer le dataset et noter sa qualité")]
#[command(long_about = "Pipeline open data : API Adresse (BAN) et geo.api.gouv.fr → snapshots GeoJSON → nettoyage → rapport de qualité Markdown.\n\nLes données sont rangées dans data/raw, data/processed et data/reports (GEO_DATA_DIR pour changer la racine).")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier de configuration JSON
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let config = PipelineConfig::load(cli.config.as_deref())?;
    config.ensure_dirs()?;
    debug!(data_dir = %config.data_dir.display(), "Data directories ready");

    match cli.command {
        Commands::Geocode {
            input,
            limit,
            enrich,
        } => {
            cli::cmd_geocode(&config, &input, limit, enrich).await?;
        }
        Commands::Clean {
            input,
            numeric_strategy,
            placeholder,
        } => {
            cli::cmd_clean(&config, input.as_deref(), numeric_strategy, &placeholder)?;
        }
        Commands::Quality { input, name } => {
            cli::cmd_quality(&config, input.as_deref(), &name)?;
        }
        Commands::Inspect { input, filters } => {
            cli::cmd_inspect(&config, input.as_deref(), &filters)?;
        }
        Commands::Run {
            input,
            limit,
            enrich,
            numeric_strategy,
            placeholder,
            name,
        } => {
            cli::cmd_run(
                &config,
                &input,
                limit,
                enrich,
                numeric_strategy,
                &placeholder,
                &name,
            )
            .await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
