pub mod aladin;
pub mod finance;
pub mod steam;
pub mod weather;

use dashfeed_cache::SharedStore;
use dashfeed_kernel::{settings::Settings, ModuleRegistry};

/// Register every endpoint module; order here is start order.
pub fn register_all(
    registry: &mut ModuleRegistry,
    settings: &Settings,
    store: SharedStore,
) -> anyhow::Result<()> {
    registry.register(finance::create_module(settings)?)?;
    registry.register(aladin::create_module(settings)?)?;
    registry.register(steam::create_module(settings)?)?;
    registry.register(weather::create_module(settings, store)?)?;
    Ok(())
}
