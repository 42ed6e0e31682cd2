mod config;
mod error;
mod pipeline;
mod services;
mod state;
mod store;

use crate::config::Config;
use crate::state::AppState;
use actix_web::{error as actix_error, web, App, HttpResponse, HttpServer};
use env_logger::Env;
use log::{error, info};
use serde_json::json;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // A missing .env file is the normal case outside development.
    let _ = dotenvy::dotenv();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let store = store::open(&config.data_mode).map_err(|e| {
        error!("Failed to open storage: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let pdf = pipeline::pdf::engine_from_config(&config);
    info!("PDF engine: {}", pdf.name());

    let state = AppState {
        store,
        pdf,
        pdf_timeout: config.pdf_timeout,
        upload_limit: config.upload_limit,
    };
    let json_limit = config.json_limit;

    info!("Server running at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(
                web::JsonConfig::default()
                    .limit(json_limit)
                    .error_handler(|err, _req| {
                        let response = HttpResponse::BadRequest().json(json!({ "error": err.to_string() }));
                        actix_error::InternalError::from_response(err, response).into()
                    }),
            )
            .app_data(web::Data::new(state.clone()))
            .route("/health", web::get().to(services::health::process))
            .service(services::templates::configure_routes())
            .service(services::documents::configure_routes())
            .service(services::users::configure_routes())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
