//! Sunshine MLOps CLI Module
//!
//! Command-line entry points for the feature pipeline, training and prediction.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{FeaturePipelineSettings, TrainingSettings};
use crate::pipeline::{FeaturePipeline, TrainingPipeline};
use crate::timeseries::{TimeFeatureAugmenter, TimeWindowFeatures};
use crate::training::{FeatureMatrix, ModelRegistry};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sunshine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Feature and training pipelines for daily sunshine forecasting")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract Meteostat data, transform it and load it into the feature store
    FeaturePipeline {
        /// Directory holding the settings files
        #[arg(short, long, default_value = "config")]
        config_dir: PathBuf,
    },

    /// Train a model from a feature view and register it
    Train {
        /// Directory holding the settings files
        #[arg(short, long, default_value = "config")]
        config_dir: PathBuf,
    },

    /// Predict with a registered model
    Predict {
        /// Model registry directory
        #[arg(short, long)]
        model: PathBuf,

        /// Registered model name
        #[arg(short, long)]
        name: String,

        /// Model version, latest when omitted
        #[arg(long)]
        version: Option<u32>,

        /// Input data file (CSV or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Add the rolling time features before predicting
        #[arg(long)]
        add_time_features: bool,

        /// Date column used by the time features
        #[arg(long, default_value = "date")]
        date_column: String,

        /// Output CSV with a `prediction` column
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_feature_pipeline(config_dir: &Path) -> anyhow::Result<()> {
    section("Feature pipeline");

    step_run("Loading settings");
    let settings = FeaturePipelineSettings::load(config_dir)?;
    step_done(&format!(
        "station {} from {} to {}",
        settings.meteostat.station_id, settings.meteostat.start_date, settings.meteostat.end_date
    ));

    step_run("Running extract, transform and load");
    let summary = FeaturePipeline::new(settings).run()?;
    step_done(&format!("{:.2}s", summary.elapsed_secs));

    println!();
    kv("Rows extracted", &summary.rows_extracted.to_string());
    kv("Rows loaded", &summary.rows_loaded.to_string());
    kv("Inserted", &summary.upsert.inserted.to_string());
    kv("Updated", &summary.upsert.updated.to_string());
    kv("Stored", &summary.upsert.total.to_string());
    kv("Feature view", &summary.feature_view);
    for violation in &summary.range_violations {
        println!(
            "  {} {} values of '{}' outside [{}, {}]",
            "!".yellow(),
            violation.count,
            violation.feature,
            violation.low,
            violation.high
        );
    }
    println!();
    Ok(())
}

pub fn cmd_train(config_dir: &Path) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading settings");
    let settings = TrainingSettings::load(config_dir)?;
    step_done(&format!(
        "view {} v{}, label {}",
        settings.feature_view_name, settings.feature_view_version, settings.label
    ));

    step_run(&format!("Training {}", settings.model_name.cyan()));
    let start = Instant::now();
    let summary = TrainingPipeline::new(settings).run()?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    kv("Model", &format!("{} v{}", summary.entry.name, summary.entry.version));
    kv("Status", &summary.entry.status.to_string());
    kv("Samples", &summary.n_samples.to_string());
    kv("Features", &summary.feature_names.join(", "));
    kv("MAE", &format!("{:.4}", summary.metrics.mae));
    kv("RMSE", &format!("{:.4}", summary.metrics.rmse));
    kv("R²", &format!("{:.4}", summary.metrics.r2));
    if let Some(cv_mae) = summary.metrics.cv_mae {
        kv("CV MAE", &format!("{:.4}", cv_mae));
    }
    if let Some(params) = &summary.best_params {
        for (name, value) in params {
            kv(name, &value.to_string());
        }
    }
    println!();
    Ok(())
}

pub fn cmd_predict(
    registry_path: &Path,
    name: &str,
    version: Option<u32>,
    data_path: &Path,
    add_time_features: bool,
    date_column: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let registry = ModelRegistry::open(registry_path)?;
    let registered = match version {
        Some(v) => registry.get_version(name, v)?,
        None => registry.get_latest(name)?,
    };
    step_done(&format!("{} v{} ({})", registered.name, registered.version, registered.status));

    step_run("Loading data");
    let df = DataLoader::new().load_auto(data_path)?;
    let mut df = if add_time_features {
        TimeWindowFeatures::default().augment(&df, date_column)?
    } else {
        df
    };
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let x = FeatureMatrix::from_dataframe(&df, &registered.feature_names)?;
    let predictions = registered.model.predict(&x)?;

    match output {
        Some(path) => {
            df.with_column(Series::new("prediction".into(), predictions.to_vec()))?;
            DataSaver::save_csv(&mut df, path)?;
            println!("  {} {}", ok("✓"), format!("Predictions saved to {}", path.display()));
        }
        None => {
            for (row, value) in predictions.iter().enumerate() {
                println!("  {:>6}  {:.2}", muted(&row.to_string()), value);
            }
        }
    }
    println!();
    Ok(())
}
