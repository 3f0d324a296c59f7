use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use inference::{
    AggregationJob, AggregationReport, AggregatorCounters, PredictionJob, PredictionReport,
    PredictorCounters,
};
use records::JobConfig;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// rating-fusion - item-based collaborative filtering inference
#[derive(Parser)]
#[command(name = "rating-fusion")]
#[command(about = "Predict ratings from item correlations and fuse them into utility scores", long_about = None)]
struct Cli {
    /// TOML file with job options (dotted keys or nested tables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override one job option, e.g. -D max.rating=5
    #[arg(short = 'D', value_name = "KEY=VALUE", global = true)]
    define: Vec<String>,

    /// Print stage counters as JSON instead of the human summary
    #[arg(long, global = true)]
    summary_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict ratings from rating, stat and correlation files
    Predict {
        /// Input files or directories; file name prefixes select the source type
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// File to write predicted rating rows to
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Fuse predicted rating rows into utility scores
    Aggregate {
        /// Predictor output files or directories
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// File to write utility score rows to
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run prediction and aggregation back to back
    Run {
        /// Input files or directories; file name prefixes select the source type
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// File to write utility score rows to
        #[arg(short, long)]
        output: PathBuf,

        /// Also keep the predicted rating rows
        #[arg(long)]
        intermediate: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct StageSummary<C> {
    groups: usize,
    records: usize,
    counters: C,
}

#[derive(Serialize, Default)]
struct RunSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    prediction: Option<StageSummary<PredictorCounters>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregation: Option<StageSummary<AggregatorCounters>>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), &cli.define)?;

    let summary = match cli.command {
        Commands::Predict { input, output } => handle_predict(&config, &input, &output)?,
        Commands::Aggregate { input, output } => handle_aggregate(&config, &input, &output)?,
        Commands::Run {
            input,
            output,
            intermediate,
        } => handle_run(&config, &input, &output, intermediate.as_deref())?,
    };

    if cli.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Defaults, then the TOML file, then -D overrides
fn load_config(path: Option<&Path>, overrides: &[String]) -> Result<JobConfig> {
    let mut config = match path {
        Some(path) => JobConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => JobConfig::default(),
    };
    for assignment in overrides {
        config
            .apply_override(assignment)
            .with_context(|| format!("Bad override -D {assignment}"))?;
    }
    config.validate().context("Invalid job configuration")?;
    Ok(config)
}

/// Expand directories into their data files, sorted by name.
///
/// Hidden and marker files (`.crc`, `_SUCCESS`, ...) are skipped.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("Failed to list {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file())
                .filter(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| !name.starts_with('.') && !name.starts_with('_'))
                })
                .collect();
            entries.sort();
            files.extend(entries);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("Input {} does not exist", input.display());
        }
    }
    Ok(files)
}

fn predict(config: &JobConfig, inputs: &[PathBuf]) -> Result<PredictionReport> {
    let mut job = PredictionJob::new(config.clone())?;
    for file in expand_inputs(inputs)? {
        job.add_file(&file)
            .with_context(|| format!("Failed to classify {}", file.display()))?;
    }
    info!("Predicting over {} grouped records", job.pending());
    job.run().context("Rating prediction failed")
}

fn aggregate(job: AggregationJob) -> Result<AggregationReport> {
    info!("Aggregating {} predictions", job.pending());
    job.run().context("Rating aggregation failed")
}

fn write_rows<I>(path: &Path, rows: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        writeln!(writer, "{row}")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Handle the 'predict' command
fn handle_predict(config: &JobConfig, inputs: &[PathBuf], output: &Path) -> Result<RunSummary> {
    let start = Instant::now();
    let report = predict(config, inputs)?;
    let delim = &config.delimiters.field;
    write_rows(output, report.outputs.iter().map(|p| p.to_row(delim)))?;
    info!("Prediction finished in {:?}", start.elapsed());

    Ok(RunSummary {
        prediction: Some(StageSummary {
            groups: report.groups,
            records: report.outputs.len(),
            counters: report.counters,
        }),
        ..Default::default()
    })
}

/// Handle the 'aggregate' command
fn handle_aggregate(config: &JobConfig, inputs: &[PathBuf], output: &Path) -> Result<RunSummary> {
    let start = Instant::now();
    let mut job = AggregationJob::new(config.clone())?;
    for file in expand_inputs(inputs)? {
        job.add_file(&file)
            .with_context(|| format!("Failed to read predictions from {}", file.display()))?;
    }
    let report = aggregate(job)?;
    let delim = &config.delimiters.field;
    write_rows(output, report.outputs.iter().map(|s| s.to_row(delim)))?;
    info!("Aggregation finished in {:?}", start.elapsed());

    Ok(RunSummary {
        aggregation: Some(StageSummary {
            groups: report.groups,
            records: report.outputs.len(),
            counters: report.counters,
        }),
        ..Default::default()
    })
}

/// Handle the 'run' command
fn handle_run(
    config: &JobConfig,
    inputs: &[PathBuf],
    output: &Path,
    intermediate: Option<&Path>,
) -> Result<RunSummary> {
    let start = Instant::now();
    let predictions = predict(config, inputs)?;
    let delim = &config.delimiters.field;
    if let Some(path) = intermediate {
        write_rows(path, predictions.outputs.iter().map(|p| p.to_row(delim)))?;
    }

    let prediction = StageSummary {
        groups: predictions.groups,
        records: predictions.outputs.len(),
        counters: predictions.counters,
    };

    let mut job = AggregationJob::new(config.clone())?;
    job.extend(predictions.outputs);
    let report = aggregate(job)?;
    write_rows(output, report.outputs.iter().map(|s| s.to_row(delim)))?;
    info!("Run finished in {:?}", start.elapsed());

    Ok(RunSummary {
        prediction: Some(prediction),
        aggregation: Some(StageSummary {
            groups: report.groups,
            records: report.outputs.len(),
            counters: report.counters,
        }),
    })
}

/// Helper function to print the stage counters
fn print_summary(summary: &RunSummary) {
    if let Some(stage) = &summary.prediction {
        let c = &stage.counters;
        println!(
            "{} predict: {} item groups -> {} predicted ratings",
            "✓".green(),
            stage.groups,
            stage.records
        );
        println!(
            "   {} correlations, {} stats, {} ratings ({} without correlations)",
            c.correlations, c.stats, c.ratings, c.ratings_without_correlations
        );
        println!(
            "   {} pairs evaluated, {} dropped as non-positive",
            c.candidate_pairs, c.non_positive
        );
        if c.late_records > 0 {
            println!(
                "   {} {} records arrived after ratings of their item",
                "!".yellow(),
                c.late_records
            );
        }
    }
    if let Some(stage) = &summary.aggregation {
        println!(
            "{} aggregate: {} predictions -> {} utility scores",
            "✓".green(),
            stage.counters.predictions,
            stage.records
        );
    }
}
