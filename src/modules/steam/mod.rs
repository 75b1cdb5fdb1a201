//! Storefront specials and top sellers.

pub mod client;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use time::OffsetDateTime;

use crate::utils::{self, upstream::UpstreamError};
use dashfeed_http::{cache_control, error::AppError};
use dashfeed_kernel::{settings::Settings, InitCtx, Module};

use client::{SteamClient, StorefrontSource};
use models::GamesPayload;

pub struct SteamState {
    pub source: Arc<dyn StorefrontSource>,
    pub items_per_bucket: usize,
}

pub struct SteamModule {
    state: Arc<SteamState>,
}

impl SteamModule {
    pub fn new(source: Arc<dyn StorefrontSource>, items_per_bucket: usize) -> Self {
        Self {
            state: Arc::new(SteamState {
                source,
                items_per_bucket,
            }),
        }
    }
}

pub async fn collect_featured(
    source: &dyn StorefrontSource,
    items_per_bucket: usize,
    now: OffsetDateTime,
) -> Result<GamesPayload, UpstreamError> {
    let featured = source.fetch_featured().await?;

    Ok(GamesPayload {
        specials: featured.specials.into_records(items_per_bucket),
        top_sellers: featured.top_sellers.into_records(items_per_bucket),
        timestamp: utils::timestamp(now),
    })
}

#[async_trait]
impl Module for SteamModule {
    fn name(&self) -> &'static str {
        "steam"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "steam module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/featured", get(get_featured))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/featured": {
                    "get": {
                        "summary": "Storefront specials and top sellers",
                        "tags": ["Games"],
                        "responses": {
                            "200": {
                                "description": "Up to ten items per bucket",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/GamesPayload" }
                                    }
                                }
                            },
                            "502": {
                                "description": "Storefront unavailable",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "GameRecord": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer" },
                            "name": { "type": "string" },
                            "discounted": { "type": "boolean" },
                            "discount_percent": { "type": "integer" },
                            "original_price": { "type": ["integer", "null"] },
                            "final_price": { "type": "integer" },
                            "currency": { "type": "string" },
                            "large_capsule_image": { "type": "string" },
                            "small_capsule_image": { "type": "string" }
                        }
                    },
                    "GamesPayload": {
                        "type": "object",
                        "properties": {
                            "specials": { "type": "array", "items": { "$ref": "#/components/schemas/GameRecord" } },
                            "top_sellers": { "type": "array", "items": { "$ref": "#/components/schemas/GameRecord" } },
                            "timestamp": { "type": "string", "format": "date-time" }
                        },
                        "required": ["specials", "top_sellers", "timestamp"]
                    }
                }
            }
        }))
    }
}

async fn get_featured(State(state): State<Arc<SteamState>>) -> Result<impl IntoResponse, AppError> {
    let payload = collect_featured(
        state.source.as_ref(),
        state.items_per_bucket,
        OffsetDateTime::now_utc(),
    )
    .await
    .map_err(|error| {
        tracing::error!(error = %error, "storefront request failed");
        AppError::upstream("Failed to fetch featured games")
    })?;

    Ok((
        [cache_control::header(cache_control::FEATURED_GAMES)],
        Json(payload),
    ))
}

pub fn create_module(settings: &Settings) -> anyhow::Result<Arc<dyn Module>> {
    let source = SteamClient::new(&settings.steam)?;
    Ok(Arc::new(SteamModule::new(
        Arc::new(source),
        settings.steam.items_per_bucket,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::models::FeaturedCategories;
    use axum::{body::Body, extract::Request, http::StatusCode};
    use tower::ServiceExt;

    struct FixedStorefront(Option<String>);

    #[async_trait]
    impl StorefrontSource for FixedStorefront {
        async fn fetch_featured(&self) -> Result<FeaturedCategories, UpstreamError> {
            match &self.0 {
                Some(body) => serde_json::from_str(body)
                    .map_err(|error| UpstreamError::decode("steam", error)),
                None => Err(UpstreamError::Status {
                    provider: "steam",
                    status: 500,
                }),
            }
        }
    }

    fn item(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "type": 0,
            "name": format!("Game {id}"),
            "discounted": true,
            "discount_percent": 40,
            "original_price": 30000,
            "final_price": 18000,
            "currency": "KRW",
            "large_capsule_image": format!("https://cdn/{id}/large.jpg"),
            "small_capsule_image": format!("https://cdn/{id}/small.jpg"),
            "headline": "a long-form description the front-end never shows",
            "windows_available": true
        })
    }

    fn featured_body(specials: usize, top_sellers: usize) -> String {
        json!({
            "specials": { "id": "cat_specials", "items": (0..specials as i64).map(item).collect::<Vec<_>>() },
            "top_sellers": { "id": "cat_topsellers", "items": (100..100 + top_sellers as i64).map(item).collect::<Vec<_>>() },
            "coming_soon": { "items": [] },
            "status": 1
        })
        .to_string()
    }

    #[tokio::test]
    async fn buckets_are_truncated_to_ten() {
        let source = FixedStorefront(Some(featured_body(25, 12)));

        let payload = collect_featured(&source, 10, OffsetDateTime::now_utc())
            .await
            .unwrap();

        assert_eq!(payload.specials.len(), 10);
        assert_eq!(payload.top_sellers.len(), 10);
        assert_eq!(payload.specials[0].id, 0);
        assert_eq!(payload.top_sellers[0].id, 100);
        assert_eq!(payload.specials[0].original_price, Some(30000));
    }

    #[tokio::test]
    async fn missing_bucket_is_empty() {
        let source = FixedStorefront(Some(r#"{"specials":{"items":[]}}"#.to_string()));

        let payload = collect_featured(&source, 10, OffsetDateTime::now_utc())
            .await
            .unwrap();

        assert!(payload.specials.is_empty());
        assert!(payload.top_sellers.is_empty());
    }

    #[tokio::test]
    async fn featured_endpoint_drops_description_fields() {
        let module = SteamModule::new(Arc::new(FixedStorefront(Some(featured_body(3, 3)))), 10);

        let response = module
            .routes()
            .oneshot(Request::get("/featured").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("cache-control").unwrap(),
            cache_control::FEATURED_GAMES
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["specials"][0].get("headline").is_none());
        assert_eq!(body["top_sellers"][2]["final_price"], 18000);
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway() {
        let module = SteamModule::new(Arc::new(FixedStorefront(None)), 10);

        let response = module
            .routes()
            .oneshot(Request::get("/featured").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
