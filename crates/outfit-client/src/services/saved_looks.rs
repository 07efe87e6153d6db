use std::time::Duration;

use outfit_core::keys::saved_looks as keys;
use outfit_core::saved_look::{
    CreateSavedLookInput, SavedLook, SavedLookFilter, UpdateSavedLookInput,
};
use outfit_core::types::QueryParams;
use serde_json::Value;

use super::Outfit;
use crate::query::{CacheEffect, QueryOptions};
use crate::Result;

const LIST_STALE: Duration = Duration::from_secs(5 * 60);
const DETAIL_STALE: Duration = Duration::from_secs(10 * 60);
const DASHBOARD_STALE: Duration = Duration::from_secs(2 * 60);

pub const DASHBOARD_LIMIT: u32 = 6;

pub struct SavedLooks<'a> {
    outfit: &'a Outfit,
}

impl<'a> SavedLooks<'a> {
    pub(crate) fn new(outfit: &'a Outfit) -> Self {
        SavedLooks { outfit }
    }

    pub async fn list(&self, filter: &SavedLookFilter) -> Result<Vec<SavedLook>> {
        let api = self.outfit.api();
        let params = filter.to_query();
        let opts = QueryOptions::new(keys::list(filter)).stale_time(LIST_STALE);
        self.outfit
            .queries()
            .query(opts, || api.get_with::<Vec<SavedLook>>("/saved-looks", &params))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<SavedLook>> {
        let api = self.outfit.api();
        let path = format!("/saved-looks/{id}");
        let opts = QueryOptions::new(keys::detail(id)).stale_time(DETAIL_STALE);
        self.outfit
            .queries()
            .query_if(!id.is_empty(), opts, || api.get::<SavedLook>(&path))
            .await
    }

    /// The newest looks, for the dashboard.
    pub async fn dashboard(&self) -> Result<Vec<SavedLook>> {
        let api = self.outfit.api();
        let params = QueryParams::new()
            .with("limit", DASHBOARD_LIMIT)
            .with("sort", "createdAt:desc");
        let opts = QueryOptions::new(keys::dashboard()).stale_time(DASHBOARD_STALE);
        self.outfit
            .queries()
            .query(opts, || api.get_with::<Vec<SavedLook>>("/saved-looks", &params))
            .await
    }

    pub async fn create(&self, input: &CreateSavedLookInput) -> Result<SavedLook> {
        self.outfit
            .queries()
            .mutate(
                self.outfit.api().post::<SavedLook, _>("/saved-looks", input),
                |_| vec![CacheEffect::Invalidate(keys::all())],
            )
            .await
    }

    pub async fn update(&self, id: &str, input: &UpdateSavedLookInput) -> Result<SavedLook> {
        let path = format!("/saved-looks/{id}");
        self.outfit
            .queries()
            .mutate(self.outfit.api().put::<SavedLook, _>(&path, input), |_| {
                vec![CacheEffect::Invalidate(keys::all())]
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = format!("/saved-looks/{id}");
        self.outfit
            .queries()
            .mutate(self.outfit.api().delete::<Value>(&path), |_| {
                vec![CacheEffect::Invalidate(keys::all())]
            })
            .await
            .map(|_| ())
    }
}
