//! Shared cache-control policies for API handlers.

use axum::http::{header::CACHE_CONTROL, HeaderName, HeaderValue};

/// Quotes: 5 minutes at browser and edge.
pub const QUOTES: &str = "public, max-age=300, s-maxage=300";

/// Bestseller lists: 24 hours.
pub const BESTSELLERS: &str = "public, max-age=86400, s-maxage=86400";

/// Storefront specials: 10 minutes.
pub const FEATURED_GAMES: &str = "public, max-age=600, s-maxage=600";

/// Weather forecast: 30 minutes.
pub const FORECAST: &str = "public, max-age=1800, s-maxage=1800";

/// Header tuple for use in a handler's response parts.
pub fn header(policy: &'static str) -> (HeaderName, HeaderValue) {
    (CACHE_CONTROL, HeaderValue::from_static(policy))
}
