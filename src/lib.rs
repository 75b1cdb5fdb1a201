//! Dashboard feed application: upstream modules and the process lifecycle
//! that wires them to the edge router.

pub mod modules;
pub mod utils;

use anyhow::Context;

use dashfeed_cache::MemoryStore;
use dashfeed_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Build a registry with every module wired to `store`.
pub fn build_registry(
    settings: &Settings,
    store: dashfeed_cache::SharedStore,
) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings, store)?;
    Ok(registry)
}

/// Run the service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = build_registry(&settings, MemoryStore::shared())?;
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = dashfeed_http::start_server(&registry, &settings, dashfeed_http::shutdown_signal())
        .await
        .context("server exited with an error");

    let stopped = registry.stop_all().await;
    tracing::info!("dashfeed shut down");

    served.and(stopped)
}
