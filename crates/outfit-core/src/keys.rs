//! Hierarchical cache keys.
//!
//! A key is an ordered list of segments: a leading domain (`"analyses"`), an
//! optional sub-scope (`"list"`, `"detail"`) and parameter payloads. Every
//! segment is stored as canonical JSON (object keys sorted, no whitespace), so
//! two filters with equal contents always address the same cache slot and
//! prefix matching works segment by segment.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// QueryKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Start a key at its domain segment.
    pub fn root(domain: &str) -> Self {
        Self(vec![canonical(&Value::String(domain.to_string()))])
    }

    /// Append a plain string segment (sub-scope or identifier).
    pub fn push(mut self, segment: &str) -> Self {
        self.0.push(canonical(&Value::String(segment.to_string())));
        self
    }

    /// Append a parameter payload. Filters and scalars in this crate always
    /// serialize; anything that does not is keyed as `null`.
    pub fn param<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        let v = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.push(canonical(&v));
        self
    }

    /// True if `prefix`'s segments are a leading run of this key's segments.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn domain(&self) -> Option<String> {
        self.0
            .first()
            .and_then(|s| serde_json::from_str::<String>(s).ok())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(","))
    }
}

/// Render `v` as compact JSON with object keys in sorted order.
fn canonical(v: &Value) -> String {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), canonical(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Domain key builders
// ---------------------------------------------------------------------------

pub mod auth {
    use super::QueryKey;

    pub fn user() -> QueryKey {
        QueryKey::root("auth").push("user")
    }
}

pub mod analyses {
    use super::QueryKey;
    use crate::analysis::AnalysisFilter;

    pub fn all() -> QueryKey {
        QueryKey::root("analyses")
    }

    pub fn lists() -> QueryKey {
        all().push("list")
    }

    pub fn list(filters: &AnalysisFilter) -> QueryKey {
        lists().param(&serde_json::json!({ "filters": filters }))
    }

    pub fn details() -> QueryKey {
        all().push("detail")
    }

    pub fn detail(id: &str) -> QueryKey {
        details().push(id)
    }
}

pub mod products {
    use super::QueryKey;
    use crate::product::ProductFilter;

    pub fn all() -> QueryKey {
        QueryKey::root("products")
    }

    pub fn lists() -> QueryKey {
        all().push("list")
    }

    pub fn list(filters: &ProductFilter) -> QueryKey {
        lists().param(&serde_json::json!({ "filters": filters }))
    }

    pub fn search(query: &str, filters: &ProductFilter) -> QueryKey {
        lists().push("search").push(query).param(filters)
    }

    pub fn details() -> QueryKey {
        all().push("detail")
    }

    pub fn detail(id: &str) -> QueryKey {
        details().push(id)
    }

    pub fn matches(item_id: &str) -> QueryKey {
        all().push("matches").push(item_id)
    }
}

pub mod recommendations {
    use super::QueryKey;
    use crate::commerce::PersonalizedFilter;

    pub fn all() -> QueryKey {
        QueryKey::root("recommendations")
    }

    pub fn dashboard() -> QueryKey {
        all().push("dashboard")
    }

    pub fn personalized(filters: Option<&PersonalizedFilter>) -> QueryKey {
        all().push("personalized").param(&filters)
    }

    pub fn trending(limit: u32) -> QueryKey {
        all().push("trending").param(&limit)
    }

    pub fn category(category: &str, limit: u32) -> QueryKey {
        all().push("category").push(category).param(&limit)
    }

    pub fn similar(product_id: &str, limit: u32) -> QueryKey {
        all().push("similar").push(product_id).param(&limit)
    }
}

pub mod saved_looks {
    use super::QueryKey;
    use crate::saved_look::SavedLookFilter;

    pub fn all() -> QueryKey {
        QueryKey::root("savedLooks")
    }

    pub fn lists() -> QueryKey {
        all().push("list")
    }

    pub fn list(filters: &SavedLookFilter) -> QueryKey {
        lists().param(filters)
    }

    pub fn details() -> QueryKey {
        all().push("detail")
    }

    pub fn detail(id: &str) -> QueryKey {
        details().push(id)
    }

    pub fn dashboard() -> QueryKey {
        all().push("dashboard")
    }
}

pub mod cart {
    use super::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::root("cart")
    }
}
