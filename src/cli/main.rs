use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use credit_risk_scorer::{
    config::Config,
    data::{engineer_features, read_transactions, write_feature_table},
    logging::init_tracing,
    models::CustomerFeatures,
    tracking::{create_registry, create_tracker},
    training::{train_and_log_model, RegistryTarget},
};
use reqwest::Client;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "credit-risk-cli")]
#[command(about = "Credit Risk Scorer CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both candidate models and save the best one
    Train {
        /// Labeled feature table (CSV)
        #[arg(value_name = "DATA")]
        data: PathBuf,

        /// Model output path (defaults to artifacts.model_path)
        #[arg(short, long)]
        model_out: Option<PathBuf>,

        /// Scaler output path (defaults to artifacts.scaler_path)
        #[arg(short, long)]
        scaler_out: Option<PathBuf>,

        /// Register the selected model in the configured registry
        #[arg(short, long)]
        register: bool,
    },

    /// Build the customer feature table from raw transactions
    Features {
        #[arg(value_name = "TRANSACTIONS")]
        input: PathBuf,

        #[arg(short, long, default_value = "data/processed/customer_features.csv")]
        output: PathBuf,
    },

    /// Send a JSON array of feature records to a running service
    Predict {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);

    match cli.command {
        Commands::Train {
            data,
            model_out,
            scaler_out,
            register,
        } => {
            let model_out = model_out.unwrap_or_else(|| config.artifacts.model_path.clone());
            let scaler_out = scaler_out.unwrap_or_else(|| config.artifacts.scaler_path.clone());

            let tracker = create_tracker(&config.tracking)?;
            let registry = if register || config.training.register_model {
                let registry = create_registry(&config.registry)?;
                if registry.is_none() {
                    bail!("Model registration requested but registry.enabled is false");
                }
                registry
            } else {
                None
            };
            let target = registry.as_deref().map(|registry| RegistryTarget {
                registry,
                name: &config.registry.model_name,
                stage: &config.registry.stage,
            });

            let outcome = train_and_log_model(
                &data,
                &model_out,
                &scaler_out,
                &config.training,
                tracker.as_ref(),
                target,
            )
            .await?;

            println!("Run: {}", outcome.run_id);
            for candidate in &outcome.candidates {
                let roc_auc = candidate
                    .metrics
                    .roc_auc
                    .map(|v| format!("{:.4}", v))
                    .unwrap_or_else(|| "undefined".to_string());
                println!(
                    "  {:<20} f1={:.4} accuracy={:.4} roc_auc={} {}",
                    candidate.name,
                    candidate.metrics.f1_score,
                    candidate.metrics.accuracy,
                    roc_auc,
                    candidate.params
                );
            }
            println!("Selected: {}", outcome.selected);
            println!("Model:  {}", model_out.display());
            println!("Scaler: {}", scaler_out.display());
        }

        Commands::Features { input, output } => {
            let transactions = read_transactions(&input)?;
            let rows = engineer_features(&transactions)?;
            write_feature_table(&output, &rows)?;
            println!("Wrote {} customers to {}", rows.len(), output.display());
        }

        Commands::Predict { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records: Vec<CustomerFeatures> =
                serde_json::from_str(&contents).context("File is not a JSON array of feature records")?;

            let response = Client::new()
                .post(format!("{}/predict/", cli.endpoint))
                .json(&records)
                .send()
                .await?;

            let status = response.status();
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            if !status.is_success() {
                bail!("Prediction failed with status {}", status);
            }
        }

        Commands::Health => {
            let response = Client::new()
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
