use super::create::create_document;
use super::get::get_document;
use crate::error::AppResult;
use crate::pipeline::pdf::{generate_pdf, pdf_file_name};
use crate::pipeline::print::prepare_for_print;
use crate::state::AppState;
use actix_web::http::header::ContentDisposition;
use actix_web::{web, HttpResponse};
use common::model::document::Document;
use common::requests::GeneratePdfRequest;
use log::error;

/// `POST /api/documents/pdf`.
///
/// The document is rendered and stored first; a failure in the PDF step is
/// reported to the caller but leaves the stored document in place.
pub async fn generate(
    state: web::Data<AppState>,
    payload: web::Json<GeneratePdfRequest>,
) -> AppResult<HttpResponse> {
    let request = payload.into_inner();
    let file_name = pdf_file_name(request.file_name.as_deref());
    let document_request = request.document_request();
    let templates = state.templates();
    let documents = state.documents();
    let document = web::block(move || {
        create_document(&templates, &documents, &document_request, file_name)
    })
    .await??;
    pdf_response(&state, &document).await
}

/// `GET /api/documents/{document_id}/download-pdf`: re-renders the stored
/// `rendered` body, named after the stored file name.
pub async fn download(
    state: web::Data<AppState>,
    document_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let repo = state.documents();
    let id = document_id.into_inner();
    let document = web::block(move || get_document(&repo, &id)).await??;
    pdf_response(&state, &document).await
}

async fn pdf_response(state: &AppState, document: &Document) -> AppResult<HttpResponse> {
    let prepared = prepare_for_print(&document.rendered);
    let pdf = generate_pdf(state.pdf.as_ref(), &prepared, state.pdf_timeout)
        .await
        .inspect_err(|e| error!("PDF for document {} failed: {}", document.id, e))?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition::attachment(document.download_name()))
        .body(pdf))
}
