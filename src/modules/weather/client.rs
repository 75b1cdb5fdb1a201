//! Multi-location forecast client with rate-limit retry.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::utils::upstream::{check_status, http_client, UpstreamError};
use dashfeed_kernel::settings::WeatherSettings;

use super::models::{City, ForecastBody, LocationForecast};

const PROVIDER: &str = "open-meteo";

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m";
const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability,weather_code";
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max,sunrise,sunset";

/// Fetches forecasts for many locations in one round trip. Results come back
/// in request order.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch_forecasts(&self, cities: &[City]) -> Result<Vec<LocationForecast>, UpstreamError>;
}

/// Retry budget for rate-limited calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &WeatherSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: Duration::from_millis(settings.backoff_ms),
        }
    }
}

/// Run `op`, retrying only on 429. The wait before retry `n` is
/// `n * backoff`; every other outcome returns immediately.
pub async fn retry_rate_limited<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(error) if error.is_rate_limited() && attempt < policy.max_attempts => {
                let delay = policy.backoff * attempt;
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "forecast request rate limited; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

pub struct OpenMeteoClient {
    client: Client,
    base_url: Url,
    timezone: String,
    forecast_days: u8,
    retry: RetryPolicy,
}

impl OpenMeteoClient {
    pub fn new(settings: &WeatherSettings) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(None, settings.timeout_ms)?,
            base_url: Url::parse(&settings.base_url)?,
            timezone: settings.timezone.clone(),
            forecast_days: settings.forecast_days,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    /// Single request URL covering every city.
    pub fn forecast_url(&self, cities: &[City]) -> Url {
        let join = |coord: fn(&City) -> f64| {
            cities
                .iter()
                .map(|city| coord(city).to_string())
                .collect::<Vec<_>>()
                .join(",")
        };

        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &join(|city: &City| city.latitude))
            .append_pair("longitude", &join(|city: &City| city.longitude))
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("hourly", HOURLY_FIELDS)
            .append_pair("daily", DAILY_FIELDS)
            .append_pair("timezone", &self.timezone)
            .append_pair("forecast_days", &self.forecast_days.to_string());
        url
    }

    async fn fetch_once(&self, url: &Url) -> Result<Vec<LocationForecast>, UpstreamError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        check_status(PROVIDER, response.status())?;

        let body = response
            .bytes()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        parse_forecasts(&body)
    }
}

pub fn parse_forecasts(body: &[u8]) -> Result<Vec<LocationForecast>, UpstreamError> {
    serde_json::from_slice::<ForecastBody>(body)
        .map(ForecastBody::into_locations)
        .map_err(|error| UpstreamError::decode(PROVIDER, error))
}

#[async_trait]
impl ForecastSource for OpenMeteoClient {
    async fn fetch_forecasts(&self, cities: &[City]) -> Result<Vec<LocationForecast>, UpstreamError> {
        let url = self.forecast_url(cities);
        retry_rate_limited(self.retry, || self.fetch_once(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::weather::models::CITIES;
    use crate::utils::test_server;
    use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn rate_limit_is_retried_until_success() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let result = retry_rate_limited(quick_policy(), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(UpstreamError::RateLimited { provider: PROVIDER })
            } else {
                Ok("forecast")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "forecast");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let result: Result<(), _> = retry_rate_limited(quick_policy(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::RateLimited { provider: PROVIDER })
        })
        .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_statuses_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let result: Result<(), _> = retry_rate_limited(quick_policy(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::Status {
                provider: PROVIDER,
                status: 503,
            })
        })
        .await;

        assert!(matches!(
            result.unwrap_err(),
            UpstreamError::Status { status: 503, .. }
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn url_batches_all_cities() {
        let client = OpenMeteoClient::new(&WeatherSettings::default()).unwrap();

        let url = client.forecast_url(&CITIES[..2]);
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert!(pairs.contains(&("latitude".into(), "37.5665,35.1796".into())));
        assert!(pairs.contains(&("longitude".into(), "126.978,129.0756".into())));
        assert!(pairs.contains(&("timezone".into(), "Asia/Seoul".into())));
        assert!(pairs.contains(&("forecast_days".into(), "7".into())));
        assert!(pairs.contains(&("hourly".into(), HOURLY_FIELDS.into())));
    }

    #[test]
    fn malformed_body_is_decode_error() {
        assert!(matches!(
            parse_forecasts(b"<html>"),
            Err(UpstreamError::Decode { .. })
        ));
    }

    /// Forecast endpoint answering with `statuses` in turn, then 200 with one
    /// location per requested latitude. Records the hit count and the last
    /// latitude parameter.
    struct ScriptedUpstream {
        hits: Arc<AtomicUsize>,
        latitude: Arc<Mutex<Option<String>>>,
    }

    fn scripted_upstream(statuses: Vec<StatusCode>) -> (Router, ScriptedUpstream) {
        let hits = Arc::new(AtomicUsize::new(0));
        let latitude = Arc::new(Mutex::new(None));
        let recorded = ScriptedUpstream {
            hits: hits.clone(),
            latitude: latitude.clone(),
        };

        let router = Router::new().route(
            "/v1/forecast",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let hits = hits.clone();
                let latitude = latitude.clone();
                let statuses = statuses.clone();
                async move {
                    let hit = hits.fetch_add(1, Ordering::SeqCst);
                    let requested = params.get("latitude").cloned().unwrap_or_default();
                    *latitude.lock().unwrap() = Some(requested.clone());

                    if let Some(status) = statuses.get(hit) {
                        return (*status).into_response();
                    }
                    let locations: Vec<_> = requested
                        .split(',')
                        .map(|lat| json!({ "latitude": lat, "current": { "temperature_2m": 12.0 } }))
                        .collect();
                    Json(locations).into_response()
                }
            }),
        );
        (router, recorded)
    }

    async fn client_for(router: Router) -> OpenMeteoClient {
        let base = test_server::spawn(router).await;
        OpenMeteoClient::new(&WeatherSettings {
            base_url: format!("{base}/v1/forecast"),
            backoff_ms: 1,
            ..WeatherSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn rate_limited_batch_is_retried_over_http() {
        let (router, upstream) =
            scripted_upstream(vec![StatusCode::TOO_MANY_REQUESTS, StatusCode::TOO_MANY_REQUESTS]);
        let client = client_for(router).await;

        let locations = client.fetch_forecasts(&CITIES).await.unwrap();

        assert_eq!(locations.len(), CITIES.len());
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 3);
        let latitude = upstream.latitude.lock().unwrap().clone().unwrap();
        assert!(latitude.starts_with("37.5665,35.1796"));
        assert_eq!(latitude.split(',').count(), CITIES.len());
    }

    #[tokio::test]
    async fn service_unavailable_is_not_retried_over_http() {
        let (router, upstream) = scripted_upstream(vec![StatusCode::SERVICE_UNAVAILABLE]);
        let client = client_for(router).await;

        let error = client.fetch_forecasts(&CITIES).await.unwrap_err();

        assert!(matches!(error, UpstreamError::Status { status: 503, .. }));
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }
}
