use actix_web::{HttpResponse, Responder};

/// `GET /health`: liveness probe, answers `ok` while the process serves requests.
pub async fn process() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body("ok")
}
