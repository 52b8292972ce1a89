//! Sunshine MLOps - Main Entry Point

use clap::Parser;
use sunshine_mlops::cli::{cmd_feature_pipeline, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sunshine_mlops=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::FeaturePipeline { config_dir } => {
            cmd_feature_pipeline(&config_dir)?;
        }
        Commands::Train { config_dir } => {
            cmd_train(&config_dir)?;
        }
        Commands::Predict { model, name, version, data, add_time_features, date_column, output } => {
            cmd_predict(&model, &name, version, &data, add_time_features, &date_column, output.as_deref())?;
        }
    }

    Ok(())
}
