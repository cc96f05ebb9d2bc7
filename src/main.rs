use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use movie_reconcile::config::ReconcileConfig;
use movie_reconcile::curation::curate;
use movie_reconcile::dataset::{award_titles, load_awards, load_metadata, metadata_titles, save_awards};
use movie_reconcile::normalize::RulePreset;
use movie_reconcile::output::write_report;
use movie_reconcile::progress::{create_spinner, format_duration, set_log_only, PhaseBars};
use movie_reconcile::reconcile::{apply_exact_titles, ReconcileOptions, Reconciler};
use movie_reconcile::safety::validate_output_path;
use movie_reconcile::scoring::SimilarityMetric;

#[derive(Parser)]
#[command(name = "movie-reconcile")]
#[command(about = "Match Oscar award titles against a movie metadata catalog")]
struct Args {
    /// Award nominations CSV
    awards: PathBuf,

    /// Movie metadata CSV
    metadata: PathBuf,

    /// Output SQLite database (name must contain "reconciled")
    output: PathBuf,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Review threshold for similarity matches (overrides config)
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long, value_enum)]
    metric: Option<SimilarityMetric>,

    #[arg(long, value_enum)]
    preset: Option<RulePreset>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Rank similarity candidates on the current thread
    #[arg(long)]
    sequential: bool,

    /// Hide progress bars, log progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write run statistics as JSON
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Write curated award rows with exact-match titles applied
    #[arg(long)]
    awards_out: Option<PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> Result<ReconcileConfig> {
    let mut config = match &args.config {
        Some(path) => ReconcileConfig::load(path)?,
        None => ReconcileConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(metric) = args.metric {
        config.metric = metric;
    }
    if let Some(preset) = args.preset {
        config.normalization.preset = preset;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();
    let config = load_config(&args).context("Invalid configuration")?;
    let rules = config.rules()?;

    validate_output_path(&args.output, "reconciled", &[&args.awards, &args.metadata])?;
    if let Some(awards_out) = &args.awards_out {
        validate_output_path(awards_out, "reconciled", &[&args.awards, &args.metadata, &args.output])?;
    }

    // Load
    let spinner = create_spinner("Loading award dataset");
    let awards = load_awards(&args.awards).context("Failed to load award dataset")?;
    spinner.finish_with_message(format!("Loaded {} award rows", awards.rows.len()));

    let (awards, curation_stats) = curate(awards.rows, &config.curation);
    info!(
        kept = curation_stats.kept,
        input = curation_stats.input_rows,
        "curated award rows"
    );
    if let Ok(json) = serde_json::to_string_pretty(&curation_stats) {
        info!("curation statistics\n{}", json);
    }

    let spinner = create_spinner("Loading metadata catalog");
    let metadata = load_metadata(&args.metadata).context("Failed to load metadata catalog")?;
    spinner.finish_with_message(format!("Loaded {} metadata rows", metadata.rows.len()));

    let (movies, no_year) = metadata_titles(&metadata.rows);
    if no_year > 0 {
        warn!(no_year, "metadata rows without a usable release date were not indexed");
    }
    drop(metadata);

    // Reconcile
    let reconciler = Reconciler::new(
        &movies,
        rules,
        ReconcileOptions {
            threshold: config.threshold,
            metric: config.metric,
            parallel: !args.sequential,
        },
    );
    let titles = award_titles(&awards);
    let bars = PhaseBars::new();
    let report = reconciler.reconcile_with_progress(&titles, &|p| bars.update(p));
    bars.finish();
    report.stats.log_phase("reconcile");

    // Persist
    if args.output.exists() {
        std::fs::remove_file(&args.output).context("Failed to remove existing output file")?;
    }
    info!(output = %args.output.display(), "creating output database");
    let mut conn = Connection::open(&args.output).context("Failed to create output database")?;
    write_report(&mut conn, &report)?;

    if let Some(path) = &args.stats_json {
        report.stats.write_to_file(path).context("Failed to write stats JSON")?;
        info!(path = %path.display(), "wrote statistics");
    }

    if let Some(path) = &args.awards_out {
        let mut awards = awards;
        let changed = apply_exact_titles(&mut awards, &report);
        save_awards(path, &awards).context("Failed to write award rows")?;
        info!(changed, path = %path.display(), "wrote award rows with canonical titles");
    }

    let stats = &report.stats;
    info!(
        records = stats.total_records,
        exact = stats.exact_total(),
        provisional = stats.similarity_above_threshold,
        unmatched = stats.unmatched_total(),
        below_threshold = stats.unmatched_below_threshold,
        match_rate = %format!("{:.1}%", stats.match_rate()),
        elapsed = %format_duration(start.elapsed()),
        "reconciliation complete"
    );

    Ok(())
}
