//! # HTTP Services
//!
//! One sub-module per resource, each exposing `configure_routes()` that returns
//! an actix [`Scope`](actix_web::Scope) mounted by `main`.
//!
//! Handlers stay thin: they validate the request, run the synchronous core
//! function on the blocking pool (`web::block`) and map failures through
//! [`AppError`](crate::error::AppError).

pub mod documents;
pub mod health;
pub mod templates;
pub mod users;

use serde::Serialize;

/// `{ "items": [...] }` wrapper used by every list endpoint.
#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

/// `{ "ok": true }` body returned by deletes.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Ack { ok: true }
    }
}
