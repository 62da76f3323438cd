use anyhow::Context;
use clap::Parser;

use shelfwise_cli::app;
use shelfwise_cli::args::Cli;
use shelfwise_cli::commands::execute;
use shelfwise_infra::Settings;
use shelfwise_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(url) = &cli.database_url {
        settings.database.url = url.clone();
    }

    shelfwise_observability::init(
        &settings.log.filter,
        LogFormat::from_json_flag(settings.log.json),
    );

    let app = app::connect(&settings).await?;
    let output = execute(&app, &cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
