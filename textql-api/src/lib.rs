use actix_web::web;

pub mod config;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod models;
pub mod state;

use error::ApiError;

/// Registers every route and the JSON extractor configuration.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::InvalidBody(err.to_string()).into()
    }))
    .service(handlers::health::health_check)
    .service(handlers::query::process_text)
    .service(handlers::query::query);
}
