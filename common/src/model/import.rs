use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of importing an uploaded HTML, DOCX or text file as a template body.
///
/// `keys` lists the placeholders inferred from highlighted regions in document
/// order, and `defaults` maps each of them to the highlighted text it replaced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportedTemplate {
    pub name: String,
    pub content: String,
    pub keys: Vec<String>,
    pub defaults: BTreeMap<String, String>,
}
