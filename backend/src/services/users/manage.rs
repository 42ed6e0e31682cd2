use crate::error::{AppError, AppResult};
use crate::services::{Ack, Items};
use crate::state::AppState;
use crate::store::repo::Repository;
use actix_web::{web, HttpResponse};
use common::model::user::{PublicUser, Role, User};
use common::requests::UserRequest;
use log::info;

/// `GET /api/users`.
pub async fn list(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let repo = state.users();
    let items = web::block(move || list_users(&repo)).await??;
    Ok(HttpResponse::Ok().json(Items { items }))
}

/// `GET /api/users/{user_id}`.
pub async fn process(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.users();
    let id = user_id.into_inner();
    let user = web::block(move || get_user(&repo, &id)).await??;
    Ok(HttpResponse::Ok().json(PublicUser::from(user)))
}

/// `POST /api/users`.
pub async fn create(
    state: web::Data<AppState>,
    payload: web::Json<UserRequest>,
) -> AppResult<HttpResponse> {
    let repo = state.users();
    let request = payload.into_inner();
    let user = web::block(move || create_user(&repo, &request)).await??;
    Ok(HttpResponse::Ok().json(user))
}

/// `PUT /api/users/{user_id}`.
pub async fn update(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
    payload: web::Json<UserRequest>,
) -> AppResult<HttpResponse> {
    let repo = state.users();
    let id = user_id.into_inner();
    let request = payload.into_inner();
    let user = web::block(move || update_user(&repo, &id, &request)).await??;
    Ok(HttpResponse::Ok().json(user))
}

/// `DELETE /api/users/{user_id}`.
pub async fn delete(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.users();
    let id = user_id.into_inner();
    web::block(move || delete_user(&repo, &id)).await??;
    Ok(HttpResponse::Ok().json(Ack::ok()))
}

pub fn list_users(repo: &Repository<User>) -> AppResult<Vec<PublicUser>> {
    let mut users = repo.list()?;
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(users.into_iter().map(PublicUser::from).collect())
}

pub fn get_user(repo: &Repository<User>, id: &str) -> AppResult<User> {
    repo.find(id)?.ok_or_else(|| AppError::not_found("User"))
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

pub fn create_user(repo: &Repository<User>, request: &UserRequest) -> AppResult<PublicUser> {
    if is_blank(&request.username) || is_blank(&request.password_hash) {
        return Err(AppError::validation("username and passwordHash required"));
    }
    let user = repo.add(request)?;
    info!("Created user {} ({:?})", user.username, user.role);
    Ok(user.into())
}

/// Applies the fields present in `request`. Demoting the only admin is a
/// conflict.
pub fn update_user(repo: &Repository<User>, id: &str, request: &UserRequest) -> AppResult<PublicUser> {
    if (request.username.is_some() && is_blank(&request.username))
        || (request.password_hash.is_some() && is_blank(&request.password_hash))
    {
        return Err(AppError::validation("username and passwordHash must not be empty"));
    }
    let existing = get_user(repo, id)?;
    let demotes = existing.role == Role::Admin && request.role.is_some_and(|r| r != Role::Admin);
    if demotes && is_last_admin(repo, &existing)? {
        return Err(AppError::Conflict("cannot demote the last admin".into()));
    }
    let user = repo
        .update(id, request)?
        .ok_or_else(|| AppError::not_found("User"))?;
    info!("Updated user {}", user.username);
    Ok(user.into())
}

pub fn delete_user(repo: &Repository<User>, id: &str) -> AppResult<()> {
    let existing = get_user(repo, id)?;
    if existing.role == Role::Admin && is_last_admin(repo, &existing)? {
        return Err(AppError::Conflict("cannot delete the last admin".into()));
    }
    if !repo.remove(id)? {
        return Err(AppError::not_found("User"));
    }
    info!("Deleted user {}", existing.username);
    Ok(())
}

fn is_last_admin(repo: &Repository<User>, user: &User) -> AppResult<bool> {
    let other_admins = repo
        .list()?
        .iter()
        .filter(|u| u.role == Role::Admin && u.id != user.id)
        .count();
    Ok(other_admins == 0)
}
