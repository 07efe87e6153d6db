use std::time::Duration;

use outfit_core::commerce::AddToCartInput;
use outfit_core::keys;
use outfit_core::product::{Product, ProductFilter, ProductMatch};
use serde_json::Value;

use super::Outfit;
use crate::query::{CacheEffect, QueryOptions};
use crate::Result;

const LIST_STALE: Duration = Duration::from_secs(5 * 60);
const DETAIL_STALE: Duration = Duration::from_secs(30 * 60);
const MATCHES_STALE: Duration = Duration::from_secs(10 * 60);
const SEARCH_STALE: Duration = Duration::from_secs(2 * 60);

/// Shortest search query that is sent to the backend.
pub const MIN_SEARCH_CHARS: usize = 3;

pub struct Products<'a> {
    outfit: &'a Outfit,
}

impl<'a> Products<'a> {
    pub(crate) fn new(outfit: &'a Outfit) -> Self {
        Products { outfit }
    }

    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let api = self.outfit.api();
        let params = filter.to_query();
        let opts = QueryOptions::new(keys::products::list(filter)).stale_time(LIST_STALE);
        self.outfit
            .queries()
            .query(opts, || api.get_with::<Vec<Product>>("/products", &params))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Product>> {
        let api = self.outfit.api();
        let path = format!("/products/{id}");
        let opts = QueryOptions::new(keys::products::detail(id)).stale_time(DETAIL_STALE);
        self.outfit
            .queries()
            .query_if(!id.is_empty(), opts, || api.get::<Product>(&path))
            .await
    }

    /// Candidate products for one detected item.
    pub async fn matches(&self, item_id: &str) -> Result<Option<Vec<ProductMatch>>> {
        let api = self.outfit.api();
        let path = format!("/products/matches/{item_id}");
        let opts = QueryOptions::new(keys::products::matches(item_id)).stale_time(MATCHES_STALE);
        self.outfit
            .queries()
            .query_if(!item_id.is_empty(), opts, || {
                api.get::<Vec<ProductMatch>>(&path)
            })
            .await
    }

    /// Free-text search. Queries shorter than [`MIN_SEARCH_CHARS`] are not
    /// sent and yield `None`.
    pub async fn search(&self, query: &str, filter: &ProductFilter) -> Result<Option<Vec<Product>>> {
        let api = self.outfit.api();
        let mut params = filter.to_query();
        params.push("q", query);
        let opts = QueryOptions::new(keys::products::search(query, filter)).stale_time(SEARCH_STALE);
        let enabled = query.chars().count() >= MIN_SEARCH_CHARS;
        self.outfit
            .queries()
            .query_if(enabled, opts, || {
                api.get_with::<Vec<Product>>("/products/search", &params)
            })
            .await
    }

    pub async fn add_to_cart(&self, input: &AddToCartInput) -> Result<Value> {
        self.outfit
            .queries()
            .mutate(
                self.outfit.api().post::<Value, _>("/cart/items", input),
                |_| vec![CacheEffect::Invalidate(keys::cart::all())],
            )
            .await
    }
}
