use crate::model::user::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/templates` and `PUT /api/templates/{id}`.
///
/// Absent fields are left untouched on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /api/documents`. At least one of `template_id` and `content`
/// must be present; an explicit `content` wins over the stored template body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Body of `POST /api/documents/pdf`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePdfRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl GeneratePdfRequest {
    pub fn document_request(&self) -> CreateDocumentRequest {
        CreateDocumentRequest {
            template_id: self.template_id.clone(),
            content: self.content.clone(),
            data: self.data.clone(),
        }
    }
}

/// Body of `POST /api/users` and `PUT /api/users/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}
