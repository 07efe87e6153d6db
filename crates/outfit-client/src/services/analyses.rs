use std::time::Duration;

use outfit_core::analysis::{
    Analysis, AnalysisFilter, CreateAnalysisInput, DetectedItem, UpdateAnalysisInput, UserFeedback,
};
use outfit_core::keys::analyses as keys;
use serde_json::Value;

use super::Outfit;
use crate::query::{CacheEffect, QueryOptions};
use crate::Result;

const LIST_STALE: Duration = Duration::from_secs(5 * 60);
const DETAIL_STALE: Duration = Duration::from_secs(2 * 60);

pub struct Analyses<'a> {
    outfit: &'a Outfit,
}

impl<'a> Analyses<'a> {
    pub(crate) fn new(outfit: &'a Outfit) -> Self {
        Analyses { outfit }
    }

    pub async fn list(&self, filter: &AnalysisFilter) -> Result<Vec<Analysis>> {
        let api = self.outfit.api();
        let params = filter.to_query();
        let opts = QueryOptions::new(keys::list(filter)).stale_time(LIST_STALE);
        self.outfit
            .queries()
            .query(opts, || api.get_with::<Vec<Analysis>>("/analyses", &params))
            .await
    }

    /// `None` when `id` is empty.
    pub async fn get(&self, id: &str) -> Result<Option<Analysis>> {
        let api = self.outfit.api();
        let path = format!("/analyses/{id}");
        let opts = QueryOptions::new(keys::detail(id)).stale_time(DETAIL_STALE);
        self.outfit
            .queries()
            .query_if(!id.is_empty(), opts, || api.get::<Analysis>(&path))
            .await
    }

    pub async fn create(&self, input: &CreateAnalysisInput) -> Result<Analysis> {
        self.outfit
            .queries()
            .mutate(
                self.outfit.api().post::<Analysis, _>("/analyses", input),
                |created| {
                    vec![
                        CacheEffect::Invalidate(keys::lists()),
                        CacheEffect::seed(keys::detail(&created.id), created, DETAIL_STALE),
                    ]
                },
            )
            .await
    }

    pub async fn update(&self, id: &str, input: &UpdateAnalysisInput) -> Result<Analysis> {
        let path = format!("/analyses/{id}");
        self.outfit
            .queries()
            .mutate(
                self.outfit.api().put::<Analysis, _>(&path, input),
                |updated| {
                    vec![
                        CacheEffect::seed(keys::detail(&updated.id), updated, DETAIL_STALE),
                        CacheEffect::Invalidate(keys::lists()),
                    ]
                },
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = format!("/analyses/{id}");
        self.outfit
            .queries()
            .mutate(self.outfit.api().delete::<Value>(&path), |_| {
                vec![
                    CacheEffect::Remove(keys::detail(id)),
                    CacheEffect::Invalidate(keys::lists()),
                ]
            })
            .await
            .map(|_| ())
    }

    /// Edit one detected item. A cached copy of the parent analysis is
    /// patched in place instead of being refetched.
    pub async fn update_item(
        &self,
        analysis_id: &str,
        item_id: &str,
        patch: &Value,
    ) -> Result<DetectedItem> {
        let path = format!("/analyses/{analysis_id}/items/{item_id}");
        let item: DetectedItem = self.outfit.api().put(&path, patch).await?;
        let replaced = item.clone();
        self.outfit
            .queries()
            .update_query_data::<Analysis, _>(&keys::detail(analysis_id), move |a| {
                a.replace_item(replaced);
            });
        Ok(item)
    }

    pub async fn submit_feedback(
        &self,
        analysis_id: &str,
        item_id: &str,
        feedback: &UserFeedback,
    ) -> Result<()> {
        let path = format!("/analyses/{analysis_id}/items/{item_id}/feedback");
        self.outfit
            .queries()
            .mutate(self.outfit.api().post::<Value, _>(&path, feedback), |_| {
                vec![CacheEffect::Invalidate(keys::detail(analysis_id))]
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::outfit;
    use mockito::Matcher;
    use outfit_core::analysis::AnalysisStatus;

    fn analysis_json(id: &str, color: &str) -> String {
        format!(
            r#"{{"id":"{id}","imageUrl":"https://img/x.jpg","status":"completed","progress":100,
                "detectedItems":[{{"id":"i1","type":"top","category":"shirt","color":"{color}","confidence":0.9}}]}}"#
        )
    }

    #[tokio::test]
    async fn list_passes_filter_and_caches() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/analyses")
            .match_query(Matcher::UrlEncoded("status".into(), "completed".into()))
            .with_status(200)
            .with_body(format!("[{}]", analysis_json("a1", "blue")))
            .expect(1)
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("t"));
        let filter = AnalysisFilter {
            status: vec![AnalysisStatus::Completed],
            ..Default::default()
        };

        assert_eq!(o.analyses().list(&filter).await.unwrap().len(), 1);
        assert_eq!(o.analyses().list(&filter.clone()).await.unwrap().len(), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn get_with_empty_id_is_disabled() {
        let server = mockito::Server::new_async().await;
        let (o, _) = outfit(&server, Some("t"));
        assert!(o.analyses().get("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_invalidates_lists_so_next_read_refetches() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/api/analyses")
            .with_status(200)
            .with_body("[]")
            .expect(2)
            .create_async()
            .await;
        server
            .mock("POST", "/api/analyses")
            .with_status(201)
            .with_body(analysis_json("a2", "red"))
            .create_async()
            .await;
        let detail = server
            .mock("GET", "/api/analyses/a2")
            .expect(0)
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("t"));
        let filter = AnalysisFilter::default();

        o.analyses().list(&filter).await.unwrap();
        let input = CreateAnalysisInput {
            image_url: "https://img/x.jpg".into(),
            image_id: "up-1".into(),
            privacy_settings: None,
        };
        let created = o.analyses().create(&input).await.unwrap();
        o.analyses().list(&filter).await.unwrap();
        // detail was seeded from the create response
        let fetched = o.analyses().get("a2").await.unwrap().unwrap();
        assert_eq!(fetched, created);

        list.assert_async().await;
        detail.assert_async().await;
    }

    #[tokio::test]
    async fn delete_removes_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/analyses/a1")
            .with_status(204)
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("t"));
        o.queries()
            .set_query_data(keys::detail("a1"), &serde_json::json!({}), DETAIL_STALE);

        o.analyses().delete("a1").await.unwrap();
        assert!(!o.queries().cache().contains(&keys::detail("a1")));
    }

    #[tokio::test]
    async fn update_item_patches_cached_analysis() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/analyses/a1")
            .with_status(200)
            .with_body(analysis_json("a1", "blue"))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("PUT", "/api/analyses/a1/items/i1")
            .with_status(200)
            .with_body(r#"{"id":"i1","type":"top","category":"shirt","color":"green","confidence":0.9,"isEdited":true}"#)
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("t"));

        o.analyses().get("a1").await.unwrap();
        o.analyses()
            .update_item("a1", "i1", &serde_json::json!({"color": "green"}))
            .await
            .unwrap();

        let cached = o.analyses().get("a1").await.unwrap().unwrap();
        assert_eq!(cached.detected_items[0].color, "green");
        assert!(cached.detected_items[0].is_edited);
    }

    #[tokio::test]
    async fn feedback_invalidates_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyses/a1/items/i1/feedback")
            .match_body(Matcher::PartialJson(serde_json::json!({"isAccurate": false})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("t"));
        o.queries()
            .set_query_data(keys::detail("a1"), &serde_json::json!({}), DETAIL_STALE);

        let feedback = UserFeedback {
            is_accurate: false,
            corrected_attributes: None,
            rating: 2,
            comments: Some("wrong colour".into()),
            submitted_at: "2026-10-01T12:00:00Z".parse().unwrap(),
        };
        o.analyses()
            .submit_feedback("a1", "i1", &feedback)
            .await
            .unwrap();
        assert!(o.queries().cache().is_stale(&keys::detail("a1")));
    }
}
