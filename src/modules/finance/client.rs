//! Chart API client for single-symbol quotes.

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::utils::upstream::{check_status, http_client, UpstreamError};
use dashfeed_kernel::settings::FinanceSettings;

use super::models::{ChartResponse, QuoteRecord};

const PROVIDER: &str = "chart-api";

/// Source of per-symbol quotes. Implementations never fail: any upstream
/// problem yields `None` so one bad symbol cannot abort a batch.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Option<QuoteRecord>;
}

/// Reqwest-backed chart API client (1-day range, 1-day interval).
pub struct ChartClient {
    client: Client,
    base_url: Url,
}

impl ChartClient {
    pub fn new(settings: &FinanceSettings) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(Some(&settings.user_agent), settings.timeout_ms)?,
            base_url: Url::parse(&settings.base_url)?,
        })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::decode(PROVIDER, "base url cannot carry a path"))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("range", "1d")
            .append_pair("interval", "1d");
        Ok(url)
    }

    async fn try_fetch(&self, symbol: &str) -> Result<QuoteRecord, UpstreamError> {
        let response = self
            .client
            .get(self.chart_url(symbol)?)
            .send()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        check_status(PROVIDER, response.status())?;

        let body = response
            .bytes()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        parse_chart(symbol, &body)?.ok_or_else(|| UpstreamError::Missing {
            provider: PROVIDER,
            item: symbol.to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for ChartClient {
    async fn fetch_quote(&self, symbol: &str) -> Option<QuoteRecord> {
        match self.try_fetch(symbol).await {
            Ok(quote) => Some(quote),
            Err(error) => {
                tracing::warn!(symbol, error = %error, "quote unavailable");
                None
            }
        }
    }
}

/// Decode a chart payload. `Ok(None)` when the payload has no usable `meta`.
pub fn parse_chart(symbol: &str, body: &[u8]) -> Result<Option<QuoteRecord>, UpstreamError> {
    let response: ChartResponse =
        serde_json::from_slice(body).map_err(|error| UpstreamError::decode(PROVIDER, error))?;

    Ok(response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.meta)
        .and_then(|meta| meta.into_quote(symbol)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_server;
    use axum::{extract::Path, http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    fn client() -> ChartClient {
        ChartClient::new(&FinanceSettings::default()).unwrap()
    }

    #[test]
    fn chart_url_escapes_symbol_and_sets_range() {
        let url = client().chart_url("^VIX").unwrap();
        assert!(url
            .as_str()
            .starts_with("https://query1.finance.yahoo.com/v8/finance/chart/"));
        assert_eq!(url.query(), Some("range=1d&interval=1d"));

        let segment = client()
            .chart_url("EUR/KRW")
            .unwrap()
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string);
        assert_eq!(segment.as_deref(), Some("EUR%2FKRW"));
    }

    #[test]
    fn parse_chart_computes_change_from_previous_close() {
        let body = br#"{"chart":{"result":[{"meta":{
            "regularMarketPrice":18.5,"chartPreviousClose":20.0,"shortName":"VIX"
        }}],"error":null}}"#;

        let quote = parse_chart("^VIX", body).unwrap().unwrap();

        assert_eq!(quote.symbol, "^VIX");
        assert_eq!(quote.name, "VIX");
        assert_eq!(quote.price, 18.5);
        assert_eq!(quote.previous_close, 20.0);
        assert!((quote.change - -1.5).abs() < 1e-9);
        assert!((quote.change_percent - -7.5).abs() < 1e-9);
        assert_eq!(quote.currency, "USD");
    }

    #[test]
    fn previous_close_falls_back_to_alternate_field() {
        let body = br#"{"chart":{"result":[{"meta":{
            "regularMarketPrice":110.0,"previousClose":100.0,"longName":"Gold","currency":"USD"
        }}]}}"#;

        let quote = parse_chart("GC=F", body).unwrap().unwrap();

        assert_eq!(quote.previous_close, 100.0);
        assert_eq!(quote.name, "Gold");
        assert!((quote.change_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_previous_close_yields_zero_change() {
        let body = br#"{"chart":{"result":[{"meta":{"regularMarketPrice":2650.1}}]}}"#;

        let quote = parse_chart("^KS11", body).unwrap().unwrap();

        assert_eq!(quote.previous_close, 2650.1);
        assert_eq!(quote.change, 0.0);
        assert_eq!(quote.change_percent, 0.0);
        assert_eq!(quote.name, "^KS11");
    }

    #[test]
    fn zero_previous_close_does_not_divide() {
        let body = br#"{"chart":{"result":[{"meta":{
            "regularMarketPrice":4.2,"chartPreviousClose":0.0
        }}]}}"#;

        let quote = parse_chart("^TNX", body).unwrap().unwrap();

        assert_eq!(quote.change_percent, 0.0);
        assert!((quote.change - 4.2).abs() < 1e-9);
    }

    #[test]
    fn missing_meta_is_none() {
        let body = br#"{"chart":{"result":[{}]}}"#;
        assert!(parse_chart("^DJI", body).unwrap().is_none());

        let body = br#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#;
        assert!(parse_chart("^DJI", body).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let error = parse_chart("^DJI", b"<html>blocked</html>").unwrap_err();
        assert!(matches!(error, UpstreamError::Decode { .. }));
    }

    /// Chart endpoint that only answers browser-like clients.
    fn chart_router(expected_agent: String) -> Router {
        Router::new().route(
            "/chart/{symbol}",
            get(move |Path(symbol): Path<String>, headers: HeaderMap| {
                let expected_agent = expected_agent.clone();
                async move {
                    let agent = headers
                        .get("user-agent")
                        .and_then(|value| value.to_str().ok());
                    if agent != Some(expected_agent.as_str()) {
                        return Err(StatusCode::FORBIDDEN);
                    }
                    Ok(Json(json!({ "chart": { "result": [{ "meta": {
                        "regularMarketPrice": 190.0,
                        "chartPreviousClose": 200.0,
                        "shortName": symbol
                    }}]}})))
                }
            }),
        )
    }

    fn client_for(base: &str, user_agent: &str) -> ChartClient {
        ChartClient::new(&FinanceSettings {
            base_url: format!("{base}/chart"),
            user_agent: user_agent.to_string(),
            ..FinanceSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn quote_is_fetched_with_configured_user_agent() {
        let agent = FinanceSettings::default().user_agent;
        let base = test_server::spawn(chart_router(agent.clone())).await;

        let quote = client_for(&base, &agent).fetch_quote("AAPL").await.unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.name, "AAPL");
        assert!((quote.change_percent - -5.0).abs() < 1e-9);

        let rejected = client_for(&base, "reqwest").fetch_quote("AAPL").await;
        assert!(rejected.is_none());
    }

    #[tokio::test]
    async fn server_error_yields_no_quote() {
        let router = Router::new().route(
            "/chart/{symbol}",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = test_server::spawn(router).await;
        let agent = FinanceSettings::default().user_agent;

        assert!(client_for(&base, &agent).fetch_quote("AAPL").await.is_none());
    }
}
