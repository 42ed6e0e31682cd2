//! # Template Service Module
//!
//! This module aggregates all API endpoints related to the management of templates.
//! It acts as a router, directing incoming HTTP requests under the `/api/templates`
//! path to the appropriate handler logic defined in its sub-modules.
//!
//! ## Sub-modules:
//! - `get`: Lists templates, fetches one, and derives its placeholder keys.
//! - `save`: Creates, partially updates and deletes templates.
//! - `import`: Converts an uploaded HTML/DOCX/text file into a template body.

mod get;
mod import;
mod save;

use actix_web::web::{delete, get, post, put, scope};
use actix_web::Scope;

/// The base path for all template-related API endpoints.
const API_PATH: &str = "/api/templates";

/// Configures and returns the Actix `Scope` for all template-related routes.
///
/// # Registered Routes:
///
/// *   **`GET /`**: `get::list`. All templates as `{ items }`, most recently
///     updated first.
/// *   **`POST /`**: `save::create`. Requires `name` and `content`.
/// *   **`POST /import`**: `import::process`. Multipart upload with a `file`
///     field; responds with `{ name, content, keys, defaults }` without
///     storing anything.
/// *   **`GET /{template_id}`**: `get::process`.
/// *   **`PUT /{template_id}`**: `save::update`. Absent fields are kept.
/// *   **`DELETE /{template_id}`**: `save::delete`. Responds `{ ok: true }`.
///     Documents rendered from the template are not touched.
/// *   **`GET /{template_id}/placeholders`**: `get::placeholders`. `{ keys }`
///     derived from the stored content.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(get::list))
        .route("", post().to(save::create))
        .route("/import", post().to(import::process))
        .route("/{template_id}", get().to(get::process))
        .route("/{template_id}", put().to(save::update))
        .route("/{template_id}", delete().to(save::delete))
        .route("/{template_id}/placeholders", get().to(get::placeholders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use actix_web::{test, web, App};
    use common::model::template::Template;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn crud_round_trip() {
        let (_dir, state) = testing::state(false);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/templates")
            .set_json(json!({ "name": "Offer", "content": "Dear {{ name }}, {{amounts.total}} {{name}}" }))
            .to_request();
        let created: Template = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created.description, "");

        let req = test::TestRequest::get()
            .uri(&format!("/api/templates/{}/placeholders", created.id))
            .to_request();
        let keys: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(keys, json!({ "keys": ["name", "amounts.total"] }));

        let req = test::TestRequest::put()
            .uri(&format!("/api/templates/{}", created.id))
            .set_json(json!({ "description": "Standard offer" }))
            .to_request();
        let updated: Template = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated.name, "Offer");
        assert_eq!(updated.description, "Standard offer");
        assert_eq!(updated.created_at, created.created_at);

        let req = test::TestRequest::get().uri("/api/templates").to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list["items"].as_array().map(Vec::len), Some(1));

        let req = test::TestRequest::delete()
            .uri(&format!("/api/templates/{}", created.id))
            .to_request();
        let ok: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(ok, json!({ "ok": true }));

        let req = test::TestRequest::get()
            .uri(&format!("/api/templates/{}", created.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }

    #[actix_web::test]
    async fn validation_and_missing_ids() {
        let (_dir, state) = testing::state(false);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/templates")
            .set_json(json!({ "name": "No body" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "name and content required" }));

        for req in [
            test::TestRequest::put()
                .uri("/api/templates/missing")
                .set_json(json!({ "name": "x" }))
                .to_request(),
            test::TestRequest::delete().uri("/api/templates/missing").to_request(),
            test::TestRequest::get()
                .uri("/api/templates/missing/placeholders")
                .to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status().as_u16(), 404);
        }
    }

    #[actix_web::test]
    async fn import_reads_multipart_file() {
        let (_dir, state) = testing::state(false);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(configure_routes()),
        )
        .await;

        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"offer.html\"\r\nContent-Type: text/html\r\n\r\n{html}\r\n--{b}--\r\n",
            b = boundary,
            html = r#"<p>Dear <span style="background-color: yellow">John Doe</span></p>"#,
        );
        let req = test::TestRequest::post()
            .uri("/api/templates/import")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(body)
            .to_request();
        let imported: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            imported,
            json!({
                "name": "offer",
                "content": "<p>Dear {{john_doe}}</p>",
                "keys": ["john_doe"],
                "defaults": { "john_doe": "John Doe" },
            })
        );

        let empty = format!("--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--{b}--\r\n", b = boundary);
        let req = test::TestRequest::post()
            .uri("/api/templates/import")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(empty)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn import_rejects_files_over_the_upload_limit() {
        let (_dir, mut state) = testing::state(false);
        state.upload_limit = 16;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(configure_routes()),
        )
        .await;

        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.txt\"\r\nContent-Type: text/plain\r\n\r\n{text}\r\n--{b}--\r\n",
            b = boundary,
            text = "x".repeat(64),
        );
        let req = test::TestRequest::post()
            .uri("/api/templates/import")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "file exceeds the 16 byte upload limit");
    }
}
