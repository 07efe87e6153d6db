use chrono::{DateTime, Utc};
use crate::product::ProductMatch;
use crate::types::{DateRange, QueryParams};
use crate::user::{Gender, PriceRange};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// AnalysisStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Detecting,
    Matching,
    Completed,
    Failed,
    Cancelled,
}

impl AnalysisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Detecting => "detecting",
            AnalysisStatus::Matching => "matching",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
            AnalysisStatus::Cancelled => "cancelled",
        }
    }

    /// No further server-side progress is expected.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnalysisStatus::Completed | AnalysisStatus::Failed | AnalysisStatus::Cancelled
        )
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "processing" => Ok(AnalysisStatus::Processing),
            "detecting" => Ok(AnalysisStatus::Detecting),
            "matching" => Ok(AnalysisStatus::Matching),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            "cancelled" => Ok(AnalysisStatus::Cancelled),
            other => Err(format!("unknown analysis status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// One outfit photo run through garment detection and product matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub image_url: String,
    #[serde(default)]
    pub image_id: String,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub detected_items: Vec<DetectedItem>,
    #[serde(default)]
    pub metadata: Option<AnalysisMetadata>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Analysis {
    /// Replace the detected item with the same id. Returns false if absent.
    pub fn replace_item(&mut self, item: DetectedItem) -> bool {
        match self.detected_items.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub fit: String,
    pub confidence: f64,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_mask: Option<String>,
    #[serde(default)]
    pub attributes: Option<ItemAttributes>,
    #[serde(default)]
    pub product_matches: Vec<ProductMatch>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<UserFeedback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAttributes {
    #[serde(default)]
    pub occasion: Vec<String>,
    #[serde(default)]
    pub season: Vec<String>,
    pub gender: Gender,
    #[serde(default)]
    pub age_group: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub care: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFeedback {
    pub is_accurate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_attributes: Option<serde_json::Value>,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    #[serde(default)]
    pub image_dimensions: Option<ImageDimensions>,
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub model_version: String,
    #[serde(default)]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub privacy_settings: Option<PrivacySettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub image_retention: ImageRetention,
    pub data_sharing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRetention {
    Private,
    Shared,
}

/// Progress push emitted over the live channel while an analysis runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub step: AnalysisStep,
    pub progress: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStep {
    Upload,
    Detection,
    Segmentation,
    AttributeExtraction,
    Matching,
    Ranking,
    Completed,
}

// ---------------------------------------------------------------------------
// Inputs & filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisInput {
    pub image_url: String,
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<PrivacySettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnalysisInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_items: Option<Vec<DetectedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AnalysisStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<AnalysisStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_matches: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl AnalysisFilter {
    pub fn to_query(&self) -> QueryParams {
        let mut q = QueryParams::new();
        if !self.status.is_empty() {
            let joined: Vec<&str> = self.status.iter().map(|s| s.as_str()).collect();
            q.push("status", joined.join(","));
        }
        if let Some(range) = &self.date_range {
            q.push("startDate", &range.start);
            q.push("endDate", &range.end);
        }
        q.push_opt("hasMatches", self.has_matches);
        q.push_opt("confidenceThreshold", self.confidence_threshold);
        q
    }
}
