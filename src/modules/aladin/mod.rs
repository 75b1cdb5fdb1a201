//! Book lists: bestsellers (with previous-week fallback), new releases and
//! blogger picks, fetched together and served only when all three succeed.

pub mod client;
pub mod models;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use futures::FutureExt;
use serde_json::json;
use time::OffsetDateTime;

use crate::utils::{
    self,
    join::{join_all, JoinPolicy},
    upstream::UpstreamError,
};
use dashfeed_http::{cache_control, error::AppError};
use dashfeed_kernel::{settings::Settings, InitCtx, Module};

use client::{fetch_bestsellers, AladinClient, BookSource};
use models::{BooksPayload, ListQuery, QueryType};

pub struct AladinState {
    pub source: Arc<dyn BookSource>,
    pub api_key: Option<String>,
    pub max_results: u32,
    /// Budget for the whole batch; expiry counts as an upstream failure.
    pub deadline: Duration,
}

pub struct AladinModule {
    state: Arc<AladinState>,
}

impl AladinModule {
    pub fn new(
        source: Arc<dyn BookSource>,
        api_key: Option<String>,
        max_results: u32,
        deadline: Duration,
    ) -> Self {
        Self {
            state: Arc::new(AladinState {
                source,
                api_key,
                max_results,
                deadline,
            }),
        }
    }
}

/// Fetch the three lists concurrently; any failure fails the batch.
pub async fn collect_lists(
    source: &dyn BookSource,
    api_key: &str,
    max_results: u32,
    now: OffsetDateTime,
) -> Result<BooksPayload, UpstreamError> {
    let new_special = ListQuery::current(QueryType::ItemNewSpecial, max_results);
    let blog_best = ListQuery::current(QueryType::BlogBest, max_results);

    let lists = join_all(
        JoinPolicy::FailFast,
        [
            fetch_bestsellers(source, api_key, max_results, now.date()).boxed(),
            source.fetch_list(api_key, &new_special),
            source.fetch_list(api_key, &blog_best),
        ],
    )
    .await?;

    let mut lists = lists.into_iter().map(|list| list.unwrap_or_default());
    Ok(BooksPayload {
        bestsellers: lists.next().unwrap_or_default(),
        new_special: lists.next().unwrap_or_default(),
        blog_best: lists.next().unwrap_or_default(),
        timestamp: utils::timestamp(now),
    })
}

#[async_trait]
impl Module for AladinModule {
    fn name(&self) -> &'static str {
        "aladin"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if self.state.api_key.is_none() {
            tracing::warn!(
                module = self.name(),
                "no catalog API key configured; bestseller requests will fail with 500"
            );
        }
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "aladin module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/bestsellers", get(get_bestsellers))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/bestsellers": {
                    "get": {
                        "summary": "Bestseller, new-release and blogger-pick book lists",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "All three lists",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BooksPayload" }
                                    }
                                }
                            },
                            "500": {
                                "description": "Catalog API key not configured",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            },
                            "502": {
                                "description": "A list could not be fetched",
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
                    "BookRecord": {
                        "type": "object",
                        "properties": {
                            "itemId": { "type": "integer" },
                            "title": { "type": "string" },
                            "link": { "type": "string" },
                            "author": { "type": "string" },
                            "pubDate": { "type": "string" },
                            "isbn13": { "type": "string" },
                            "priceSales": { "type": "integer" },
                            "priceStandard": { "type": "integer" },
                            "cover": { "type": "string" },
                            "categoryName": { "type": "string" },
                            "publisher": { "type": "string" }
                        }
                    },
                    "BooksPayload": {
                        "type": "object",
                        "properties": {
                            "bestsellers": { "type": "array", "items": { "$ref": "#/components/schemas/BookRecord" } },
                            "newSpecial": { "type": "array", "items": { "$ref": "#/components/schemas/BookRecord" } },
                            "blogBest": { "type": "array", "items": { "$ref": "#/components/schemas/BookRecord" } },
                            "timestamp": { "type": "string", "format": "date-time" }
                        },
                        "required": ["bestsellers", "newSpecial", "blogBest", "timestamp"]
                    }
                }
            }
        }))
    }
}

async fn get_bestsellers(
    State(state): State<Arc<AladinState>>,
) -> Result<impl IntoResponse, AppError> {
    let api_key = state
        .api_key
        .as_deref()
        .ok_or_else(|| AppError::configuration("Book catalog API key is not configured"))?;

    let batch = collect_lists(
        state.source.as_ref(),
        api_key,
        state.max_results,
        OffsetDateTime::now_utc(),
    );

    let payload = match tokio::time::timeout(state.deadline, batch).await {
        Ok(Ok(payload)) => payload,
        Ok(Err(error)) => {
            tracing::error!(error = %error, "book list batch failed");
            return Err(AppError::upstream("Failed to fetch book lists"));
        }
        Err(_) => {
            tracing::error!(
                deadline_ms = state.deadline.as_millis() as u64,
                "book list batch exceeded its deadline"
            );
            return Err(AppError::upstream("Failed to fetch book lists"));
        }
    };

    Ok((
        [cache_control::header(cache_control::BESTSELLERS)],
        Json(payload),
    ))
}

pub fn create_module(settings: &Settings) -> anyhow::Result<Arc<dyn Module>> {
    let source = AladinClient::new(&settings.aladin)?;
    Ok(Arc::new(AladinModule::new(
        Arc::new(source),
        settings.aladin.api_key().map(str::to_string),
        settings.aladin.max_results,
        Duration::from_millis(settings.aladin.deadline_ms),
    )))
}
