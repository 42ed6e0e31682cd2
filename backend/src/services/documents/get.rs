use crate::error::{AppError, AppResult};
use crate::services::Items;
use crate::state::AppState;
use crate::store::repo::Repository;
use actix_web::http::header::ContentDisposition;
use actix_web::{web, HttpResponse};
use common::model::document::Document;

/// Upper bound on the number of documents returned by the list endpoint.
pub const LIST_LIMIT: usize = 100;

/// `GET /api/documents`.
pub async fn list(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let repo = state.documents();
    let items = web::block(move || list_documents(&repo)).await??;
    Ok(HttpResponse::Ok().json(Items { items }))
}

/// `GET /api/documents/{document_id}`.
pub async fn process(
    state: web::Data<AppState>,
    document_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.documents();
    let id = document_id.into_inner();
    let document = web::block(move || get_document(&repo, &id)).await??;
    Ok(HttpResponse::Ok().json(document))
}

/// `GET /api/documents/{document_id}/download`: the rendered body as a
/// standalone HTML file.
pub async fn download_html(
    state: web::Data<AppState>,
    document_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.documents();
    let id = document_id.into_inner();
    let document = web::block(move || get_document(&repo, &id)).await??;
    let file_name = format!("document-{}.html", document.id);
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .insert_header(ContentDisposition::attachment(file_name.clone()))
        .body(standalone_html(&file_name, &document.rendered)))
}

/// Most recently updated first, capped at [`LIST_LIMIT`].
pub fn list_documents(repo: &Repository<Document>) -> AppResult<Vec<Document>> {
    let mut items = repo.list()?;
    items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    items.truncate(LIST_LIMIT);
    Ok(items)
}

pub fn get_document(repo: &Repository<Document>, id: &str) -> AppResult<Document> {
    repo.find(id)?.ok_or_else(|| AppError::not_found("Document"))
}

pub fn standalone_html(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        title, body
    )
}
