use std::time::Duration;

use outfit_core::commerce::PersonalizedFilter;
use outfit_core::keys::recommendations as keys;
use outfit_core::product::Product;
use outfit_core::types::QueryParams;

use super::Outfit;
use crate::query::QueryOptions;
use crate::Result;

const DASHBOARD_STALE: Duration = Duration::from_secs(10 * 60);
const PERSONALIZED_STALE: Duration = Duration::from_secs(15 * 60);
const TRENDING_STALE: Duration = Duration::from_secs(30 * 60);
const CATEGORY_STALE: Duration = Duration::from_secs(20 * 60);
const SIMILAR_STALE: Duration = Duration::from_secs(15 * 60);
const RETRY: u32 = 2;

pub const DASHBOARD_LIMIT: u32 = 8;
pub const TRENDING_LIMIT: u32 = 12;
pub const CATEGORY_LIMIT: u32 = 8;
pub const SIMILAR_LIMIT: u32 = 6;

/// Product recommendations. Every read retries transient failures twice.
pub struct Recommendations<'a> {
    outfit: &'a Outfit,
}

impl<'a> Recommendations<'a> {
    pub(crate) fn new(outfit: &'a Outfit) -> Self {
        Recommendations { outfit }
    }

    pub async fn dashboard(&self) -> Result<Vec<Product>> {
        let params = QueryParams::new().with("limit", DASHBOARD_LIMIT);
        self.fetch(
            QueryOptions::new(keys::dashboard()).stale_time(DASHBOARD_STALE),
            "/recommendations/dashboard",
            &params,
        )
        .await
    }

    pub async fn personalized(&self, filter: Option<&PersonalizedFilter>) -> Result<Vec<Product>> {
        let params = filter.map(PersonalizedFilter::to_query).unwrap_or_default();
        self.fetch(
            QueryOptions::new(keys::personalized(filter)).stale_time(PERSONALIZED_STALE),
            "/recommendations/personalized",
            &params,
        )
        .await
    }

    pub async fn trending(&self, limit: u32) -> Result<Vec<Product>> {
        let params = QueryParams::new().with("limit", limit);
        self.fetch(
            QueryOptions::new(keys::trending(limit)).stale_time(TRENDING_STALE),
            "/recommendations/trending",
            &params,
        )
        .await
    }

    /// `None` when `category` is empty.
    pub async fn category(&self, category: &str, limit: u32) -> Result<Option<Vec<Product>>> {
        if category.is_empty() {
            return Ok(None);
        }
        let params = QueryParams::new().with("limit", limit);
        let path = format!("/recommendations/category/{category}");
        self.fetch(
            QueryOptions::new(keys::category(category, limit)).stale_time(CATEGORY_STALE),
            &path,
            &params,
        )
        .await
        .map(Some)
    }

    /// `None` when `product_id` is empty.
    pub async fn similar(&self, product_id: &str, limit: u32) -> Result<Option<Vec<Product>>> {
        if product_id.is_empty() {
            return Ok(None);
        }
        let params = QueryParams::new().with("limit", limit);
        let path = format!("/recommendations/similar/{product_id}");
        self.fetch(
            QueryOptions::new(keys::similar(product_id, limit)).stale_time(SIMILAR_STALE),
            &path,
            &params,
        )
        .await
        .map(Some)
    }

    async fn fetch(
        &self,
        opts: QueryOptions,
        path: &str,
        params: &QueryParams,
    ) -> Result<Vec<Product>> {
        let api = self.outfit.api();
        self.outfit
            .queries()
            .query(opts.retry(RETRY), || api.get_with::<Vec<Product>>(path, params))
            .await
    }
}
