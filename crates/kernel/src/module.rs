use async_trait::async_trait;
use axum::Router;

/// Context provided to modules during initialization and startup
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// An endpoint group mounted under `/api/{name}`.
///
/// Modules own their upstream clients and any background work; the registry
/// drives `init` → `start` → `stop` and the HTTP layer mounts `routes`.
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module, also its URL segment
    fn name(&self) -> &'static str;

    /// Called once during application startup, before `start`
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the Axum router for this module's routes
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` + `components.schemas`) merged into the
    /// service document
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Spawn background tasks for this module
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop background tasks and release resources
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
