use std::sync::Arc;

use clap::Parser;

use sprout::bootstrap::init_tracing;
use sprout::classifier::LlmClassifier;
use sprout::cli::{Cli, Command, run_status_command};
use sprout::config::Config;
use sprout::db::{GardenStore, connect_from_config};
use sprout::garden::{GardenEngine, GardenService};
use sprout::gateway::{GatewayState, start_server};
use sprout::llm::create_llm_provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(&config.logging)?;

    match cli.command() {
        Command::Status => run_status_command(&config).await,
        Command::Migrate => {
            let store = connect_from_config(&config.database).await?;
            store.run_migrations().await?;
            tracing::info!(path = %config.database.path.display(), "schema up to date");
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = connect_from_config(&config.database).await?;
    store.run_migrations().await?;

    if config.llm.api_key.is_none() {
        tracing::warn!("LLM_API_KEY is not set; classifier calls will likely be rejected");
    }
    let provider = create_llm_provider(&config.llm)?;
    let classifier = LlmClassifier::new(provider, config.llm.temperature);

    let service = GardenService::new(
        Arc::new(store),
        Arc::new(classifier),
        GardenEngine::new(config.engine.attrition),
        config.classifier.clone(),
    );
    let state = Arc::new(GatewayState {
        service: Arc::new(service),
    });

    start_server(&config.gateway.bind_addr(), state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {e}");
        }
    })
    .await?;

    Ok(())
}
