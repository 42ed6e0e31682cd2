//! # User Service Module
//!
//! Account records under `/api/users`. Credentials are issued and checked by
//! the external authentication layer, which also hashes passwords; this
//! service stores the hash it is given and never returns it.
//!
//! Two rules are enforced on every change: usernames are unique, and the last
//! remaining admin can be neither demoted nor deleted.

mod manage;

use actix_web::web::{delete, get, post, put, scope};
use actix_web::Scope;

/// The base path for all user-related API endpoints.
const API_PATH: &str = "/api/users";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(manage::list))
        .route("", post().to(manage::create))
        .route("/{user_id}", get().to(manage::process))
        .route("/{user_id}", put().to(manage::update))
        .route("/{user_id}", delete().to(manage::delete))
}
