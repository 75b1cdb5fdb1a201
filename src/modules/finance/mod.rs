//! Market quotes: one chart call per configured symbol, settled together.

pub mod client;
pub mod models;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use time::OffsetDateTime;

use crate::utils::{
    self,
    join::{join_all, successes, JoinPolicy},
};
use dashfeed_http::cache_control;
use dashfeed_kernel::{settings::Settings, InitCtx, Module};

use client::{ChartClient, QuoteSource};
use models::QuotesPayload;

/// Shared handler state
pub struct FinanceState {
    pub source: Arc<dyn QuoteSource>,
    pub symbols: Vec<String>,
}

pub struct FinanceModule {
    state: Arc<FinanceState>,
}

impl FinanceModule {
    pub fn new(source: Arc<dyn QuoteSource>, symbols: Vec<String>) -> Self {
        Self {
            state: Arc::new(FinanceState { source, symbols }),
        }
    }
}

/// Fetch every symbol concurrently and keep whichever succeed.
pub async fn collect_quotes(
    source: &dyn QuoteSource,
    symbols: &[String],
    now: OffsetDateTime,
) -> QuotesPayload {
    let fetches = symbols.iter().map(|symbol| async move {
        source
            .fetch_quote(symbol)
            .await
            .map(|quote| (symbol.clone(), quote))
            .ok_or(symbol)
    });

    let outcomes = join_all(JoinPolicy::SettleAll, fetches)
        .await
        .unwrap_or_default();

    let quotes: BTreeMap<_, _> = successes(outcomes).collect();
    tracing::info!(
        requested = symbols.len(),
        served = quotes.len(),
        "quotes collected"
    );

    QuotesPayload {
        quotes,
        timestamp: utils::timestamp(now),
    }
}

#[async_trait]
impl Module for FinanceModule {
    fn name(&self) -> &'static str {
        "finance"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            symbols = self.state.symbols.len(),
            "finance module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/quotes", get(get_quotes))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/quotes": {
                    "get": {
                        "summary": "Latest quotes for indices, FX, commodities, crypto and yields",
                        "tags": ["Finance"],
                        "responses": {
                            "200": {
                                "description": "Quotes keyed by symbol; unavailable symbols are omitted",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/QuotesPayload" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "QuoteRecord": {
                        "type": "object",
                        "properties": {
                            "symbol": { "type": "string" },
                            "name": { "type": "string" },
                            "price": { "type": "number" },
                            "previousClose": { "type": "number" },
                            "change": { "type": "number" },
                            "changePercent": { "type": "number" },
                            "currency": { "type": "string" }
                        },
                        "required": ["symbol", "name", "price", "previousClose", "change", "changePercent", "currency"]
                    },
                    "QuotesPayload": {
                        "type": "object",
                        "properties": {
                            "quotes": {
                                "type": "object",
                                "additionalProperties": { "$ref": "#/components/schemas/QuoteRecord" }
                            },
                            "timestamp": { "type": "string", "format": "date-time" }
                        },
                        "required": ["quotes", "timestamp"]
                    }
                }
            }
        }))
    }
}

/// Always 200; partial results are the normal degraded mode.
async fn get_quotes(State(state): State<Arc<FinanceState>>) -> impl IntoResponse {
    let payload = collect_quotes(
        state.source.as_ref(),
        &state.symbols,
        OffsetDateTime::now_utc(),
    )
    .await;

    ([cache_control::header(cache_control::QUOTES)], Json(payload))
}

/// Create the module with the reqwest-backed chart client
pub fn create_module(settings: &Settings) -> anyhow::Result<Arc<dyn Module>> {
    let source = ChartClient::new(&settings.finance)?;
    Ok(Arc::new(FinanceModule::new(
        Arc::new(source),
        settings.finance.symbols.clone(),
    )))
}
