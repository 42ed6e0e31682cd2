use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A rendered instance of a template bound to concrete data.
///
/// `content` is a snapshot of the template body at render time, so the history
/// of a document survives later edits or removal of the template it came from.
/// `rendered` is computed once at creation and never re-rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    /// Weak back-reference; the template may no longer exist.
    pub template_id: Option<String>,
    pub content: String,
    pub data: Value,
    pub rendered: String,
    /// Assigned when the document is produced through the PDF path.
    pub file_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    /// File name used for the `Content-Disposition` header of a PDF download.
    pub fn download_name(&self) -> String {
        match &self.file_name {
            Some(name) => name.clone(),
            None => format!("document-{}.pdf", self.id),
        }
    }
}
