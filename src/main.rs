mod main_runtime;

use anyhow::{bail, Context};
use clap::Parser;
use digit_ledger::adapters::{bind_address, start_api_server, PostgresStore};
use digit_ledger::api::AppState;
use digit_ledger::batch::run_batch;
use digit_ledger::cli::{Cli, Commands};
use digit_ledger::config::AppConfig;
use digit_ledger::ml::load_classifier;
use std::sync::Arc;
use tracing::{error, info};

use main_runtime::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    init_logging(&config.logging);

    if let Err(problems) = config.validate() {
        for problem in &problems {
            error!("Invalid configuration: {}", problem);
        }
        bail!("{} configuration problem(s)", problems.len());
    }

    match &cli.command {
        Commands::Serve => serve(&config).await?,
        Commands::Batch(args) => {
            let source = args.source()?;
            let report = run_batch(&config, &source, args.save_sample.as_deref()).await?;
            println!("{report}");
        }
        Commands::InitDb => {
            PostgresStore::bootstrap(&config.database, config.retry.policy()).await?;
            info!("Database '{}' is ready", config.database.name);
        }
    }

    Ok(())
}

async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    // The model is loaded before the database so a bad artifact fails fast.
    let classifier = load_classifier(config.model.path())
        .with_context(|| format!("loading model {}", config.model.path().display()))?;

    let store = PostgresStore::bootstrap(&config.database, config.retry.policy()).await?;
    let state = AppState::new(Arc::new(store), classifier);

    start_api_server(state, bind_address(&config.server)?).await?;
    Ok(())
}
