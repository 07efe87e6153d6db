use chrono::{DateTime, Utc};
use crate::analysis::DetectedItem;
use crate::product::{Product, ProductVariant};
use crate::types::{DateRange, QueryParams};
use crate::user::PriceRange;
use serde::{Deserialize, Serialize};

/// A user-curated outfit: detected items paired with chosen products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLook {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub items: Vec<SavedLookItem>,
    #[serde(default)]
    pub total: Option<SavedLookTotal>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLookItem {
    pub id: String,
    pub detected_item: DetectedItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_product: Option<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<ProductVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLookTotal {
    pub estimated_price: f64,
    pub currency: String,
    #[serde(default)]
    pub store_count: u32,
    #[serde(default)]
    pub item_count: u32,
    pub availability: Availability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Full,
    Partial,
    None,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Full => "full",
            Availability::Partial => "partial",
            Availability::None => "none",
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs & filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookItemSelection {
    pub detected_item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSavedLookInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_url: String,
    pub items: Vec<LookItemSelection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSavedLookInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LookItemSelection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLookFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

impl SavedLookFilter {
    pub fn to_query(&self) -> QueryParams {
        let mut q = QueryParams::new();
        if !self.tags.is_empty() {
            q.push("tags", self.tags.join(","));
        }
        q.push_opt("isPublic", self.is_public);
        if let Some(range) = &self.date_range {
            q.push("startDate", &range.start);
            q.push("endDate", &range.end);
        }
        q.push_opt("availability", self.availability.map(Availability::as_str));
        if let Some(range) = self.price_range {
            q.push("minPrice", range.min);
            q.push("maxPrice", range.max);
        }
        q
    }
}
