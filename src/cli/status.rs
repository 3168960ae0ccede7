//! Configuration and health summary CLI command.

use crate::config::Config;
use crate::db::GardenStore;
use crate::garden::AttritionStrategy;

/// Run the status command, printing resolved configuration.
pub async fn run_status_command(config: &Config) -> anyhow::Result<()> {
    println!("Sprout Status");
    println!("=============\n");

    println!(
        "  Version:     {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    print!("  Database:    ");
    let path = &config.database.path;
    if config.database.remote_url.is_some() {
        println!("libSQL replica ({} + remote sync)", path.display());
    } else if path.exists() {
        match check_database(config).await {
            Ok(()) => println!("libSQL ({})", path.display()),
            Err(e) => println!("error ({e})"),
        }
    } else {
        println!("libSQL (file missing: {})", path.display());
    }

    println!(
        "  Classifier:  {} at {}{}",
        config.llm.model,
        config.llm.base_url,
        if config.llm.api_key.is_some() {
            ""
        } else {
            " (no API key)"
        }
    );
    println!(
        "  Policy:      timeout {}s, {} retries, recovered output {}",
        config.classifier.timeout.as_secs(),
        config.classifier.max_retries,
        if config.classifier.accept_recovered {
            "accepted"
        } else {
            "rejected"
        }
    );

    let attrition = match config.engine.attrition {
        AttritionStrategy::Disabled => "disabled".to_string(),
        AttritionStrategy::ThresholdAbsence { window } => format!("window of {window}"),
    };
    println!("  Attrition:   {attrition}");
    println!("  Gateway:     http://{}", config.gateway.bind_addr());

    Ok(())
}

async fn check_database(config: &Config) -> anyhow::Result<()> {
    let backend = crate::db::connect_from_config(&config.database).await?;
    backend.list_plants("").await?;
    Ok(())
}
