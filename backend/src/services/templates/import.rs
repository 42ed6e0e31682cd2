use crate::error::{AppError, AppResult};
use crate::pipeline::import::import_template;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use log::info;

/// `POST /api/templates/import`.
///
/// Reads the `file` part of the upload (other parts are drained and ignored)
/// and converts it. Nothing is stored; the client saves the result through
/// `POST /api/templates` once the user has reviewed it.
pub async fn process(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let (file_name, bytes) = read_upload(payload, state.upload_limit).await?;
    let imported = web::block(move || import_template(&bytes, &file_name)).await??;
    info!(
        "Imported template '{}' with {} placeholder(s)",
        imported.name,
        imported.keys.len()
    );
    Ok(HttpResponse::Ok().json(imported))
}

/// Collects the `file` field, enforcing `limit` bytes.
async fn read_upload(mut payload: Multipart, limit: usize) -> AppResult<(String, Vec<u8>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::validation(format!("invalid upload: {}", e)))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::validation(format!("invalid upload: {}", e)))?;
            if name.as_deref() != Some("file") {
                continue;
            }
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::validation(format!(
                    "file exceeds the {} byte upload limit",
                    limit
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if name.as_deref() == Some("file") && upload.is_none() {
            upload = Some((file_name, bytes));
        }
    }

    upload.ok_or_else(|| AppError::validation("file required"))
}
