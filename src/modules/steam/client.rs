//! Game storefront `featuredcategories` client.

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::utils::upstream::{check_status, http_client, UpstreamError};
use dashfeed_kernel::settings::SteamSettings;

use super::models::FeaturedCategories;

const PROVIDER: &str = "steam";

#[async_trait]
pub trait StorefrontSource: Send + Sync {
    async fn fetch_featured(&self) -> Result<FeaturedCategories, UpstreamError>;
}

pub struct SteamClient {
    client: Client,
    url: Url,
}

impl SteamClient {
    pub fn new(settings: &SteamSettings) -> anyhow::Result<Self> {
        let mut url = Url::parse(&settings.base_url)?;
        url.query_pairs_mut()
            .append_pair("cc", &settings.country)
            .append_pair("l", &settings.language);

        Ok(Self {
            client: http_client(None, settings.timeout_ms)?,
            url,
        })
    }
}

#[async_trait]
impl StorefrontSource for SteamClient {
    async fn fetch_featured(&self) -> Result<FeaturedCategories, UpstreamError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        check_status(PROVIDER, response.status())?;

        let body = response
            .bytes()
            .await
            .map_err(UpstreamError::transport(PROVIDER))?;

        serde_json::from_slice(&body).map_err(|error| UpstreamError::decode(PROVIDER, error))
    }
}
