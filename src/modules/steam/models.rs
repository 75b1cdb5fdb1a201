use serde::{Deserialize, Serialize};

/// Storefront item as served to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: i64,
    pub name: String,
    pub discounted: bool,
    pub discount_percent: i64,
    /// Absent for items that were never sold at a different price.
    pub original_price: Option<i64>,
    pub final_price: i64,
    pub currency: String,
    pub large_capsule_image: String,
    pub small_capsule_image: String,
}

/// `GET /api/steam/featured` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesPayload {
    pub specials: Vec<GameRecord>,
    pub top_sellers: Vec<GameRecord>,
    pub timestamp: String,
}

/// `featuredcategories` response; only the two buckets we serve are read.
#[derive(Debug, Default, Deserialize)]
pub struct FeaturedCategories {
    #[serde(default)]
    pub specials: Bucket,
    #[serde(default)]
    pub top_sellers: Bucket,
}

#[derive(Debug, Default, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub items: Vec<StoreItem>,
}

#[derive(Debug, Deserialize)]
pub struct StoreItem {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub discounted: bool,
    #[serde(default)]
    pub discount_percent: i64,
    #[serde(default)]
    pub original_price: Option<i64>,
    #[serde(default)]
    pub final_price: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub large_capsule_image: String,
    #[serde(default)]
    pub small_capsule_image: String,
}

impl From<StoreItem> for GameRecord {
    fn from(item: StoreItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            discounted: item.discounted,
            discount_percent: item.discount_percent,
            original_price: item.original_price,
            final_price: item.final_price,
            currency: item.currency,
            large_capsule_image: item.large_capsule_image,
            small_capsule_image: item.small_capsule_image,
        }
    }
}

impl Bucket {
    /// First `limit` items as records.
    pub fn into_records(self, limit: usize) -> Vec<GameRecord> {
        self.items
            .into_iter()
            .take(limit)
            .map(GameRecord::from)
            .collect()
    }
}
