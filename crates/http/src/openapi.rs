//! Service OpenAPI document assembled from module fragments.

use serde_json::{json, Value};

use dashfeed_kernel::ModuleRegistry;

/// Where the merged document is served; Swagger UI at `/swagger-ui` loads it
/// from here.
pub const DOCUMENT_PATH: &str = "/docs/openapi.json";

/// Merge every module's fragment into one document. Module paths are
/// prefixed with `/api/{module}` to match where the router mounts them.
pub fn collect(registry: &ModuleRegistry) -> Value {
    let mut spec = json!({
        "openapi": "3.1.0",
        "info": {
            "title": "dashfeed API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Cached JSON proxy for market, book, game and weather data"
        },
        "paths": {
            "/healthz": {
                "get": {
                    "summary": "Health check",
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "ErrorResponse": {
                    "type": "object",
                    "properties": { "error": { "type": "string" } },
                    "required": ["error"]
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(fragment) = module.openapi() else {
            continue;
        };

        if let Some(paths) = fragment.get("paths").and_then(Value::as_object) {
            for (path, item) in paths {
                spec["paths"][format!("/api/{}{}", module.name(), path)] = item.clone();
            }
        }

        if let Some(schemas) = fragment
            .pointer("/components/schemas")
            .and_then(Value::as_object)
        {
            for (name, schema) in schemas {
                spec["components"]["schemas"][name] = schema.clone();
            }
        }
    }

    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashfeed_kernel::Module;
    use std::sync::Arc;

    struct FragmentModule;

    #[async_trait]
    impl Module for FragmentModule {
        fn name(&self) -> &'static str {
            "steam"
        }

        fn openapi(&self) -> Option<Value> {
            Some(json!({
                "paths": { "/featured": { "get": { "summary": "Featured games" } } },
                "components": { "schemas": { "GameRecord": { "type": "object" } } }
            }))
        }
    }

    #[test]
    fn module_paths_are_prefixed_and_schemas_merged() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(FragmentModule)).unwrap();

        let spec = collect(&registry);

        assert_eq!(
            spec["paths"]["/api/steam/featured"]["get"]["summary"],
            "Featured games"
        );
        assert!(spec["paths"]["/healthz"].is_object());
        assert!(spec["components"]["schemas"]["GameRecord"].is_object());
        assert!(spec["components"]["schemas"]["ErrorResponse"].is_object());
    }
}
