use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use time::OffsetDateTime;

use dashfeed_app::modules::{aladin, finance, steam, weather};
use dashfeed_cache::MemoryStore;
use dashfeed_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "dashfeed-cli", version, about = "Operate the dashfeed proxy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server until interrupted
    Serve,
    /// Print the effective configuration as JSON with secrets redacted
    Config,
    /// Fetch one upstream once and print the normalized payload
    Fetch {
        #[arg(value_enum)]
        feed: Feed,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Feed {
    Quotes,
    Books,
    Games,
    Weather,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load dashfeed settings")?;

    match cli.command {
        Command::Serve => {
            dashfeed_telemetry::init(&settings.telemetry)?;
            dashfeed_app::run(settings).await
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings.redacted())?;
            println!("{rendered}");
            Ok(())
        }
        Command::Fetch { feed } => {
            // stdout carries only the payload; logs go to stderr.
            if let Err(error) = dashfeed_telemetry::init(&settings.telemetry) {
                eprintln!("logging disabled: {error:#}");
            }
            let payload = fetch(&settings, feed).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
    }
}

async fn fetch(settings: &Settings, feed: Feed) -> anyhow::Result<serde_json::Value> {
    let now = OffsetDateTime::now_utc();

    let payload = match feed {
        Feed::Quotes => {
            let source = finance::client::ChartClient::new(&settings.finance)?;
            let quotes = finance::collect_quotes(&source, &settings.finance.symbols, now).await;
            serde_json::to_value(quotes)?
        }
        Feed::Books => {
            let api_key = settings
                .aladin
                .api_key()
                .context("book catalog API key is not configured")?;
            let source = aladin::client::AladinClient::new(&settings.aladin)?;
            let lists =
                aladin::collect_lists(&source, api_key, settings.aladin.max_results, now).await?;
            serde_json::to_value(lists)?
        }
        Feed::Games => {
            let source = steam::client::SteamClient::new(&settings.steam)?;
            let games =
                steam::collect_featured(&source, settings.steam.items_per_bucket, now).await?;
            serde_json::to_value(games)?
        }
        Feed::Weather => {
            let source = weather::client::OpenMeteoClient::new(&settings.weather)?;
            let service = weather::service::ForecastService::new(
                Arc::new(source),
                MemoryStore::shared(),
                weather::models::CITIES.to_vec(),
                Duration::from_secs(settings.weather.cache_ttl_secs),
                settings.weather.hourly_limit,
                Duration::from_millis(settings.weather.serve_deadline_ms),
            );
            serde_json::to_value(service.snapshot(now).await?)?
        }
    };

    Ok(payload)
}
