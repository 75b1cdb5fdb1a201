//! Forecast cache: a scheduled producer and a lazy read-through producer
//! writing the same payload under one key.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;

use crate::utils::{self, upstream::UpstreamError};
use dashfeed_cache::{CacheError, SharedStore};

use super::client::ForecastSource;
use super::models::{zip_cities, City, WeatherSnapshot};

pub const CACHE_KEY: &str = "weather:forecast";

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("forecast response contained no cities")]
    Empty,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to encode forecast snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct ForecastService {
    source: Arc<dyn ForecastSource>,
    store: SharedStore,
    cities: Vec<City>,
    ttl: Duration,
    hourly_limit: usize,
    serve_deadline: Duration,
}

impl ForecastService {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        store: SharedStore,
        cities: Vec<City>,
        ttl: Duration,
        hourly_limit: usize,
        serve_deadline: Duration,
    ) -> Self {
        Self {
            source,
            store,
            cities,
            ttl,
            hourly_limit,
            serve_deadline,
        }
    }

    /// Fetch and normalize a fresh snapshot without touching the cache.
    pub async fn snapshot(&self, now: OffsetDateTime) -> Result<WeatherSnapshot, UpstreamError> {
        let locations = self.source.fetch_forecasts(&self.cities).await?;
        let cities = zip_cities(&self.cities, locations, self.hourly_limit)
            .into_iter()
            .map(|forecast| (forecast.id.clone(), forecast))
            .collect();

        Ok(WeatherSnapshot {
            cities,
            timestamp: utils::timestamp(now),
        })
    }

    /// Scheduled producer. Replaces the cached value only when the new
    /// snapshot has cities; on any failure the previous value stays.
    pub async fn refresh(&self, now: OffsetDateTime) -> Result<usize, RefreshError> {
        let snapshot = self.snapshot(now).await?;
        if snapshot.cities.is_empty() {
            return Err(RefreshError::Empty);
        }

        let count = snapshot.cities.len();
        let encoded = serde_json::to_string(&snapshot)?;
        self.store.put(CACHE_KEY, encoded, self.ttl).await?;
        Ok(count)
    }

    /// Read-through producer backing the forecast endpoint. Never fails: a
    /// fresh entry is served verbatim, a miss fetches and fills the cache,
    /// and an upstream failure yields an empty snapshot.
    ///
    /// The miss-path fetch runs as its own task. When it outlives
    /// `serve_deadline` the request gets the empty snapshot and the task
    /// still writes its result to the cache.
    pub async fn serve(self: &Arc<Self>, now: OffsetDateTime) -> String {
        match self.store.get(CACHE_KEY).await {
            Ok(Some(cached)) => return cached,
            Ok(None) => {}
            Err(error) => tracing::warn!(error = %error, "forecast cache read failed"),
        }

        let service = Arc::clone(self);
        let fill = tokio::spawn(async move { service.populate(now).await });

        match tokio::time::timeout(self.serve_deadline, fill).await {
            Ok(Ok(Ok(encoded))) => encoded,
            Ok(Ok(Err(error))) => {
                tracing::error!(error = %error, "forecast fetch failed; serving empty snapshot");
                empty_snapshot(now)
            }
            Ok(Err(error)) => {
                tracing::error!(error = %error, "forecast fetch task failed");
                empty_snapshot(now)
            }
            Err(_) => {
                tracing::warn!(
                    deadline_ms = self.serve_deadline.as_millis() as u64,
                    "forecast fetch exceeded serve deadline; finishing in background"
                );
                empty_snapshot(now)
            }
        }
    }

    /// Fetch, cache when non-empty and return the encoded snapshot.
    async fn populate(&self, now: OffsetDateTime) -> Result<String, RefreshError> {
        let snapshot = self.snapshot(now).await?;
        let encoded = serde_json::to_string(&snapshot)?;

        if !snapshot.cities.is_empty() {
            if let Err(error) = self.store.put(CACHE_KEY, encoded.clone(), self.ttl).await {
                tracing::warn!(error = %error, "forecast cache write failed");
            }
        }

        Ok(encoded)
    }
}

fn empty_snapshot(now: OffsetDateTime) -> String {
    format!(
        r#"{{"cities":{{}},"timestamp":"{}"}}"#,
        utils::timestamp(now)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::weather::models::{HourlySeries, LocationForecast, CITIES};
    use async_trait::async_trait;
    use dashfeed_cache::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    /// Answers with one location per requested city, each tagged with its
    /// position, or fails every call. `delay` holds each answer back.
    #[derive(Default)]
    struct IndexedForecasts {
        failing: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ForecastSource for IndexedForecasts {
        async fn fetch_forecasts(
            &self,
            cities: &[City],
        ) -> Result<Vec<LocationForecast>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.failing {
                return Err(UpstreamError::Status {
                    provider: "open-meteo",
                    status: 500,
                });
            }
            Ok((0..cities.len())
                .map(|index| LocationForecast {
                    current: json!({ "temperature_2m": index as f64 }),
                    hourly: HourlySeries {
                        time: (0..60).map(|h| format!("2026-10-19T{:02}:00", h % 24)).collect(),
                        temperature_2m: vec![Some(index as f64); 60],
                        precipitation_probability: vec![Some(10.0); 60],
                        weather_code: vec![Some(1); 72],
                    },
                    daily: json!({ "time": ["2026-10-19"] }),
                })
                .collect())
        }
    }

    fn service(source: Arc<IndexedForecasts>, store: SharedStore) -> Arc<ForecastService> {
        Arc::new(ForecastService::new(
            source,
            store,
            CITIES.to_vec(),
            Duration::from_secs(3600),
            48,
            Duration::from_secs(12),
        ))
    }

    fn now() -> OffsetDateTime {
        datetime!(2026-10-19 09:30:00 UTC)
    }

    #[tokio::test]
    async fn cities_are_matched_by_position() {
        let service = service(Arc::new(IndexedForecasts::default()), MemoryStore::shared());

        let snapshot = service.snapshot(now()).await.unwrap();

        assert_eq!(snapshot.cities.len(), 8);
        for (index, city) in CITIES.iter().enumerate() {
            let forecast = &snapshot.cities[city.id];
            assert_eq!(forecast.name, city.name);
            assert_eq!(forecast.current["temperature_2m"], index as f64);
            assert_eq!(forecast.hourly.time.len(), 48);
            assert_eq!(forecast.hourly.weather_code.len(), 48);
        }
    }

    #[tokio::test]
    async fn both_producers_write_the_same_payload() {
        let scheduled_store = MemoryStore::shared();
        let lazy_store = MemoryStore::shared();
        let source = Arc::new(IndexedForecasts::default());

        service(source.clone(), scheduled_store.clone())
            .refresh(now())
            .await
            .unwrap();
        let served = service(source, lazy_store.clone()).serve(now()).await;

        let scheduled = scheduled_store.get(CACHE_KEY).await.unwrap().unwrap();
        let lazy = lazy_store.get(CACHE_KEY).await.unwrap().unwrap();
        assert_eq!(scheduled, lazy);
        assert_eq!(served, lazy);
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_upstream_call() {
        let store = MemoryStore::shared();
        store
            .put(CACHE_KEY, "cached-body".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let source = Arc::new(IndexedForecasts::default());

        let body = service(source.clone(), store).serve(now()).await;

        assert_eq!(body, "cached-body");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_fetch_serves_empty_cities_and_leaves_cache_empty() {
        let store = MemoryStore::shared();
        let source = Arc::new(IndexedForecasts {
            failing: true,
            ..Default::default()
        });

        let body = service(source, store.clone()).serve(now()).await;

        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["cities"], json!({}));
        assert_eq!(parsed["timestamp"], "2026-10-19T09:30:00Z");
        assert!(store.get(CACHE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_value() {
        let store = MemoryStore::shared();
        store
            .put(CACHE_KEY, "previous".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let source = Arc::new(IndexedForecasts {
            failing: true,
            ..Default::default()
        });

        let result = service(source, store.clone()).refresh(now()).await;

        assert!(matches!(result, Err(RefreshError::Upstream(_))));
        assert_eq!(store.get(CACHE_KEY).await.unwrap().as_deref(), Some("previous"));
    }

    #[test]
    fn empty_snapshot_matches_serialized_form() {
        let encoded = serde_json::to_string(&WeatherSnapshot {
            cities: Default::default(),
            timestamp: utils::timestamp(now()),
        })
        .unwrap();
        assert_eq!(empty_snapshot(now()), encoded);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_serves_empty_then_fills_cache_in_background() {
        let store = MemoryStore::shared();
        let source = Arc::new(IndexedForecasts {
            delay: Duration::from_secs(30),
            ..Default::default()
        });

        let body = service(source.clone(), store.clone()).serve(now()).await;

        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["cities"], json!({}));
        assert!(store.get(CACHE_KEY).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_secs(30)).await;

        let cached = store.get(CACHE_KEY).await.unwrap().unwrap();
        let cached: WeatherSnapshot = serde_json::from_str(&cached).unwrap();
        assert_eq!(cached.cities.len(), CITIES.len());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
