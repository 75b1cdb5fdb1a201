//! Book catalog (`ItemList`) client.

use async_trait::async_trait;
use reqwest::{Client, Url};
use time::{Date, Duration};

use crate::utils::upstream::{check_status, http_client, UpstreamError};
use dashfeed_kernel::settings::AladinSettings;

use super::models::{BookRecord, ListQuery, ListResponse, QueryType, WeekPeriod};

const PROVIDER: &str = "aladin";
const API_VERSION: &str = "20131101";

/// Catalog list source. A failed call is an error, not an empty list.
#[async_trait]
pub trait BookSource: Send + Sync {
    async fn fetch_list(
        &self,
        api_key: &str,
        query: &ListQuery,
    ) -> Result<Vec<BookRecord>, UpstreamError>;
}

pub struct AladinClient {
    client: Client,
    base_url: Url,
}

impl AladinClient {
    pub fn new(settings: &AladinSettings) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client(None, settings.timeout_ms)?,
            base_url: Url::parse(&settings.base_url)?,
        })
    }
}

/// Query string for one list request; `Year`/`Month`/`Week` only when the
/// query names an explicit period.
pub fn query_pairs(api_key: &str, query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("ttbkey", api_key.to_string()),
        ("QueryType", query.query_type.as_str().to_string()),
        ("MaxResults", query.max_results.to_string()),
        ("start", "1".to_string()),
        ("SearchTarget", "Book".to_string()),
        ("output", "js".to_string()),
        ("Version", API_VERSION.to_string()),
    ];
    if let Some(period) = query.period {
        pairs.push(("Year", period.year.to_string()));
        pairs.push(("Month", period.month.to_string()));
        pairs.push(("Week", period.week.to_string()));
    }
    pairs
}

#[async_trait]
impl BookSource for AladinClient {
    async fn fetch_list(
        &self,
        api_key: &str,
        query: &ListQuery,
    ) -> Result<Vec<BookRecord>, UpstreamError> {
        tracing::debug!(
            query_type = query.query_type.as_str(),
            period = ?query.period,
            "fetching catalog list"
        );

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&query_pairs(api_key, query))
            .send()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        check_status(PROVIDER, response.status())?;

        let body = response
            .bytes()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        parse_list(&body, query.max_results)
    }
}

/// Decode a list payload into at most `max_results` records.
pub fn parse_list(body: &[u8], max_results: u32) -> Result<Vec<BookRecord>, UpstreamError> {
    let list: ListResponse =
        serde_json::from_slice(body).map_err(|error| UpstreamError::decode(PROVIDER, error))?;

    if let Some(code) = list.error_code {
        return Err(UpstreamError::Provider {
            provider: PROVIDER,
            message: format!(
                "code {}: {}",
                code,
                list.error_message.unwrap_or_default()
            ),
        });
    }

    Ok(list
        .item
        .into_iter()
        .take(max_results as usize)
        .map(BookRecord::from)
        .collect())
}

/// Current bestseller list, falling back to last week's when the current
/// period is not yet published.
///
/// The fallback asks for the period containing `today - 7 days`. A failure
/// of the fallback request degrades to an empty list.
pub async fn fetch_bestsellers(
    source: &dyn BookSource,
    api_key: &str,
    max_results: u32,
    today: Date,
) -> Result<Vec<BookRecord>, UpstreamError> {
    let current = ListQuery::current(QueryType::Bestseller, max_results);
    let books = source.fetch_list(api_key, &current).await?;
    if !books.is_empty() {
        return Ok(books);
    }

    let period = WeekPeriod::containing(today.saturating_sub(Duration::days(7)));
    tracing::info!(
        year = period.year,
        month = period.month,
        week = period.week,
        "current bestseller period is empty; requesting previous week"
    );

    let previous = ListQuery {
        period: Some(period),
        ..current
    };
    match source.fetch_list(api_key, &previous).await {
        Ok(books) => Ok(books),
        Err(error) => {
            tracing::warn!(error = %error, "previous-week bestseller request failed");
            Ok(Vec::new())
        }
    }
}
