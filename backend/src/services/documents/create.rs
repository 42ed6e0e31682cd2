use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::repo::Repository;
use actix_web::{web, HttpResponse};
use common::model::document::Document;
use common::model::template::Template;
use common::placeholder::render;
use common::requests::CreateDocumentRequest;
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};

/// `POST /api/documents`.
pub async fn process(
    state: web::Data<AppState>,
    payload: web::Json<CreateDocumentRequest>,
) -> AppResult<HttpResponse> {
    let templates = state.templates();
    let documents = state.documents();
    let request = payload.into_inner();
    let document =
        web::block(move || create_document(&templates, &documents, &request, None)).await??;
    Ok(HttpResponse::Ok().json(document))
}

/// The template body a document is rendered from.
#[derive(Debug, PartialEq)]
pub struct Source {
    pub template_id: Option<String>,
    pub content: String,
}

/// An explicit `content` wins; otherwise the stored template body is used.
pub fn resolve_source(
    templates: &Repository<Template>,
    request: &CreateDocumentRequest,
) -> AppResult<Source> {
    let template_id = request.template_id.clone().filter(|id| !id.is_empty());
    let content = match (request.content.as_deref(), template_id.as_deref()) {
        (Some(content), _) if !content.is_empty() => content.to_string(),
        (_, Some(id)) => {
            templates
                .find(id)?
                .ok_or_else(|| AppError::not_found("Template"))?
                .content
        }
        _ => return Err(AppError::validation("templateId or content required")),
    };
    Ok(Source {
        template_id,
        content,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewDocument<'a> {
    template_id: Option<&'a str>,
    content: &'a str,
    data: &'a Value,
    rendered: &'a str,
    file_name: Option<&'a str>,
}

/// Renders the request and persists the result. `rendered` is fixed here and
/// never recomputed.
pub fn create_document(
    templates: &Repository<Template>,
    documents: &Repository<Document>,
    request: &CreateDocumentRequest,
    file_name: Option<String>,
) -> AppResult<Document> {
    let source = resolve_source(templates, request)?;
    let data = request
        .data
        .clone()
        .filter(|d| !d.is_null())
        .unwrap_or_else(|| Value::Object(Map::new()));
    let rendered = render(&source.content, &data);

    let document = documents.add(&NewDocument {
        template_id: source.template_id.as_deref(),
        content: &source.content,
        data: &data,
        rendered: &rendered,
        file_name: file_name.as_deref(),
    })?;
    info!(
        "Created document {} from {}",
        document.id,
        source.template_id.as_deref().unwrap_or("inline content")
    );
    Ok(document)
}
