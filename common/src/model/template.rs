use serde::{Deserialize, Serialize};

/// A reusable document body containing zero or more `{{key}}` placeholders.
///
/// `content` is the only source of truth for which placeholders exist; the key
/// list is always derived with [`crate::placeholder::extract_placeholders`] and
/// never stored next to the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub content: String,
    pub description: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Template {
    /// Ordered, distinct placeholder keys found in `content`.
    pub fn placeholders(&self) -> Vec<String> {
        crate::placeholder::extract_placeholders(&self.content)
    }
}
