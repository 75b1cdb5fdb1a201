use serde::{Deserialize, Serialize};
use time::Date;

/// Thumbnail-size token in catalog cover URLs.
pub const SMALL_COVER_MARKER: &str = "coversum";
/// Replacement token selecting the large cover image.
pub const LARGE_COVER_MARKER: &str = "cover500";

/// A catalog entry as served to the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub item_id: i64,
    pub title: String,
    pub link: String,
    pub author: String,
    pub pub_date: String,
    pub isbn13: String,
    pub price_sales: i64,
    pub price_standard: i64,
    /// Never contains `SMALL_COVER_MARKER`.
    pub cover: String,
    pub category_name: String,
    pub publisher: String,
}

/// Point a cover URL at the large image. Idempotent.
pub fn enlarge_cover(cover: &str) -> String {
    cover.replace(SMALL_COVER_MARKER, LARGE_COVER_MARKER)
}

/// `GET /api/aladin/bestsellers` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooksPayload {
    pub bestsellers: Vec<BookRecord>,
    pub new_special: Vec<BookRecord>,
    pub blog_best: Vec<BookRecord>,
    pub timestamp: String,
}

/// Catalog list kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Bestseller,
    ItemNewSpecial,
    BlogBest,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Bestseller => "Bestseller",
            QueryType::ItemNewSpecial => "ItemNewSpecial",
            QueryType::BlogBest => "BlogBest",
        }
    }
}

/// Explicit weekly period for historical bestseller lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekPeriod {
    pub year: i32,
    pub month: u8,
    pub week: u8,
}

impl WeekPeriod {
    /// Week-of-month for `date`: `ceil((day + weekday of the 1st) / 7)`,
    /// weekdays counted from Sunday = 0. Not ISO 8601.
    pub fn containing(date: Date) -> Self {
        let day = date.day();
        let weekday = date.weekday().number_days_from_sunday();
        let first_weekday = (i32::from(weekday) - i32::from(day - 1)).rem_euclid(7) as u8;

        Self {
            year: date.year(),
            month: u8::from(date.month()),
            week: (day + first_weekday).div_ceil(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub query_type: QueryType,
    pub max_results: u32,
    pub period: Option<WeekPeriod>,
}

impl ListQuery {
    pub fn current(query_type: QueryType, max_results: u32) -> Self {
        Self {
            query_type,
            max_results,
            period: None,
        }
    }
}

/// `ItemList` response. The provider reports some failures as a 200 with
/// `errorCode`/`errorMessage` instead of items.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub item: Vec<CatalogItem>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(default)]
    pub item_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub isbn13: String,
    #[serde(default)]
    pub price_sales: i64,
    #[serde(default)]
    pub price_standard: i64,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub publisher: String,
}

impl From<CatalogItem> for BookRecord {
    fn from(item: CatalogItem) -> Self {
        Self {
            item_id: item.item_id,
            title: item.title,
            link: item.link,
            author: item.author,
            pub_date: item.pub_date,
            isbn13: item.isbn13,
            price_sales: item.price_sales,
            price_standard: item.price_standard,
            cover: enlarge_cover(&item.cover),
            category_name: item.category_name,
            publisher: item.publisher,
        }
    }
}
