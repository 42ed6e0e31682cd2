//! # Document Service Module
//!
//! Endpoints under `/api/documents`. A document is created by rendering a
//! template body against data; it keeps a copy of that body so its history
//! survives later edits or deletion of the template.
//!
//! ## Sub-modules:
//! - `create`: Resolves the template body, renders it and stores the document.
//! - `get`: Lists and fetches documents, and serves the rendered HTML.
//! - `pdf`: Produces PDFs, either for a new document or for a stored one.

mod create;
mod get;
mod pdf;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

/// The base path for all document-related API endpoints.
const API_PATH: &str = "/api/documents";

/// Configures and returns the Actix `Scope` for all document-related routes.
///
/// # Registered Routes:
///
/// *   **`GET /`**: `get::list`. Up to 100 documents, most recently updated first.
/// *   **`POST /`**: `create::process`. Body `{ templateId?, content?, data }`;
///     at least one of `templateId` and `content` is required.
/// *   **`POST /pdf`**: `pdf::generate`. Same body plus `fileName`; stores the
///     document, then streams the PDF as an attachment.
/// *   **`GET /{document_id}`**: `get::process`.
/// *   **`GET /{document_id}/download`**: `get::download_html`.
/// *   **`GET /{document_id}/download-pdf`**: `pdf::download`.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(get::list))
        .route("", post().to(create::process))
        .route("/pdf", post().to(pdf::generate))
        .route("/{document_id}", get().to(get::process))
        .route("/{document_id}/download", get().to(get::download_html))
        .route("/{document_id}/download-pdf", get().to(pdf::download))
}
