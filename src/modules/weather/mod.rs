//! City forecasts served from cache, kept warm by a background refresh.

pub mod client;
pub mod models;
pub mod service;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use dashfeed_cache::SharedStore;
use dashfeed_http::cache_control;
use dashfeed_kernel::{settings::Settings, InitCtx, Module};

use client::OpenMeteoClient;
use models::CITIES;
use service::ForecastService;

pub struct WeatherModule {
    service: Arc<ForecastService>,
    refresh_interval: Duration,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl WeatherModule {
    pub fn new(service: Arc<ForecastService>, refresh_interval: Duration) -> Self {
        Self {
            service,
            refresh_interval,
            refresh_task: Mutex::new(None),
        }
    }
}

async fn refresh_loop(service: Arc<ForecastService>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match service.refresh(OffsetDateTime::now_utc()).await {
            Ok(cities) => tracing::info!(cities, "forecast cache refreshed"),
            Err(error) => tracing::error!(error = %error, "forecast refresh failed"),
        }
    }
}

#[async_trait]
impl Module for WeatherModule {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            refresh_secs = self.refresh_interval.as_secs(),
            "weather module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/forecast", get(get_forecast))
            .with_state(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/forecast": {
                    "get": {
                        "summary": "Forecasts for the configured cities",
                        "description": "Served from cache. An upstream failure yields an empty city map.",
                        "tags": ["Weather"],
                        "responses": {
                            "200": {
                                "description": "Forecast snapshot",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/WeatherSnapshot" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "HourlySeries": {
                        "type": "object",
                        "properties": {
                            "time": { "type": "array", "items": { "type": "string" } },
                            "temperature_2m": { "type": "array", "items": { "type": ["number", "null"] } },
                            "precipitation_probability": { "type": "array", "items": { "type": ["number", "null"] } },
                            "weather_code": { "type": "array", "items": { "type": ["integer", "null"] } }
                        }
                    },
                    "CityForecast": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "name": { "type": "string" },
                            "current": { "type": "object" },
                            "hourly": { "$ref": "#/components/schemas/HourlySeries" },
                            "daily": { "type": "object" }
                        }
                    },
                    "WeatherSnapshot": {
                        "type": "object",
                        "properties": {
                            "cities": {
                                "type": "object",
                                "additionalProperties": { "$ref": "#/components/schemas/CityForecast" }
                            },
                            "timestamp": { "type": "string", "format": "date-time" }
                        },
                        "required": ["cities", "timestamp"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let mut task = self
            .refresh_task
            .lock()
            .map_err(|_| anyhow::anyhow!("weather refresh task lock poisoned"))?;
        if task.is_none() {
            *task = Some(tokio::spawn(refresh_loop(
                self.service.clone(),
                self.refresh_interval,
            )));
            tracing::info!(module = self.name(), "forecast refresh scheduled");
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let handle = self
            .refresh_task
            .lock()
            .map_err(|_| anyhow::anyhow!("weather refresh task lock poisoned"))?
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!(module = self.name(), "forecast refresh stopped");
        }
        Ok(())
    }
}

async fn get_forecast(State(service): State<Arc<ForecastService>>) -> impl IntoResponse {
    let body = service.serve(OffsetDateTime::now_utc()).await;
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/json")),
            cache_control::header(cache_control::FORECAST),
        ],
        body,
    )
}

pub fn create_module(settings: &Settings, store: SharedStore) -> anyhow::Result<Arc<dyn Module>> {
    let weather = &settings.weather;
    let source = OpenMeteoClient::new(weather)?;
    let service = ForecastService::new(
        Arc::new(source),
        store,
        CITIES.to_vec(),
        Duration::from_secs(weather.cache_ttl_secs),
        weather.hourly_limit,
        Duration::from_millis(weather.serve_deadline_ms),
    );
    Ok(Arc::new(WeatherModule::new(
        Arc::new(service),
        Duration::from_secs(weather.refresh_interval_secs.max(1)),
    )))
}
