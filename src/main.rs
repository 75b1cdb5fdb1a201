use anyhow::Context;
use dashfeed_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load dashfeed settings")?;
    dashfeed_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        port = settings.server.port,
        "dashfeed starting"
    );

    dashfeed_app::run(settings).await
}
