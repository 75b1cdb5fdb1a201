use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One symbol's latest price against its previous close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub currency: String,
}

impl QuoteRecord {
    /// Derive `change` and `change_percent` from the two prices.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: f64,
        previous_close: f64,
        currency: impl Into<String>,
    ) -> Self {
        let change = price - previous_close;
        let change_percent = if previous_close == 0.0 {
            0.0
        } else {
            change * 100.0 / previous_close
        };

        Self {
            symbol: symbol.into(),
            name: name.into(),
            price,
            previous_close,
            change,
            change_percent,
            currency: currency.into(),
        }
    }
}

/// `GET /api/finance/quotes` body. Failed symbols are absent, never null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotesPayload {
    pub quotes: BTreeMap<String, QuoteRecord>,
    pub timestamp: String,
}

/// Chart API envelope; only `meta` is read.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: Option<ChartMeta>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub regular_market_price: Option<f64>,
    #[serde(default)]
    pub chart_previous_close: Option<f64>,
    #[serde(default)]
    pub previous_close: Option<f64>,
}

impl ChartMeta {
    /// Build the record for `symbol`; `None` without a market price.
    pub fn into_quote(self, symbol: &str) -> Option<QuoteRecord> {
        let price = self.regular_market_price?;
        let previous_close = self
            .chart_previous_close
            .or(self.previous_close)
            .unwrap_or(price);
        let name = self
            .short_name
            .or(self.long_name)
            .or(self.symbol)
            .unwrap_or_else(|| symbol.to_string());

        Some(QuoteRecord::new(
            symbol,
            name,
            price,
            previous_close,
            self.currency.unwrap_or_else(|| "USD".to_string()),
        ))
    }
}
