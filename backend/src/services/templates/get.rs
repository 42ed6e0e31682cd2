use crate::error::{AppError, AppResult};
use crate::services::Items;
use crate::state::AppState;
use crate::store::repo::Repository;
use actix_web::{web, HttpResponse};
use common::model::template::Template;
use serde_json::json;

/// `GET /api/templates`.
pub async fn list(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let repo = state.templates();
    let items = web::block(move || list_templates(&repo)).await??;
    Ok(HttpResponse::Ok().json(Items { items }))
}

/// `GET /api/templates/{template_id}`.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.templates();
    let id = template_id.into_inner();
    let template = web::block(move || get_template(&repo, &id)).await??;
    Ok(HttpResponse::Ok().json(template))
}

/// `GET /api/templates/{template_id}/placeholders`.
pub async fn placeholders(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.templates();
    let id = template_id.into_inner();
    let template = web::block(move || get_template(&repo, &id)).await??;
    Ok(HttpResponse::Ok().json(json!({ "keys": template.placeholders() })))
}

/// All templates, most recently updated first.
pub fn list_templates(repo: &Repository<Template>) -> AppResult<Vec<Template>> {
    let mut items = repo.list()?;
    items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(items)
}

pub fn get_template(repo: &Repository<Template>, id: &str) -> AppResult<Template> {
    repo.find(id)?.ok_or_else(|| AppError::not_found("Template"))
}
