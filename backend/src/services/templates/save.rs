use crate::error::{AppError, AppResult};
use crate::services::Ack;
use crate::state::AppState;
use crate::store::repo::Repository;
use actix_web::{web, HttpResponse};
use common::model::template::Template;
use common::requests::TemplateRequest;
use log::info;

/// `POST /api/templates`.
pub async fn create(
    state: web::Data<AppState>,
    payload: web::Json<TemplateRequest>,
) -> AppResult<HttpResponse> {
    let repo = state.templates();
    let request = payload.into_inner();
    let template = web::block(move || create_template(&repo, &request)).await??;
    Ok(HttpResponse::Ok().json(template))
}

/// `PUT /api/templates/{template_id}`.
pub async fn update(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
    payload: web::Json<TemplateRequest>,
) -> AppResult<HttpResponse> {
    let repo = state.templates();
    let id = template_id.into_inner();
    let request = payload.into_inner();
    let template = web::block(move || update_template(&repo, &id, &request)).await??;
    Ok(HttpResponse::Ok().json(template))
}

/// `DELETE /api/templates/{template_id}`.
pub async fn delete(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.templates();
    let id = template_id.into_inner();
    web::block(move || delete_template(&repo, &id)).await??;
    Ok(HttpResponse::Ok().json(Ack::ok()))
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

pub fn create_template(repo: &Repository<Template>, request: &TemplateRequest) -> AppResult<Template> {
    if is_blank(&request.name) || is_blank(&request.content) {
        return Err(AppError::validation("name and content required"));
    }
    let template = repo.add(request)?;
    info!("Created template {} ({})", template.id, template.name);
    Ok(template)
}

/// Applies the fields present in `request`; a present but blank name or
/// content is rejected.
pub fn update_template(
    repo: &Repository<Template>,
    id: &str,
    request: &TemplateRequest,
) -> AppResult<Template> {
    if (request.name.is_some() && is_blank(&request.name))
        || (request.content.is_some() && is_blank(&request.content))
    {
        return Err(AppError::validation("name and content must not be empty"));
    }
    let template = repo
        .update(id, request)?
        .ok_or_else(|| AppError::not_found("Template"))?;
    info!("Updated template {}", template.id);
    Ok(template)
}

pub fn delete_template(repo: &Repository<Template>, id: &str) -> AppResult<()> {
    if !repo.remove(id)? {
        return Err(AppError::not_found("Template"));
    }
    info!("Deleted template {}", id);
    Ok(())
}
