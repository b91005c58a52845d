use crate::config::CorsConfig;
use actix_cors::Cors;
use actix_web::http::Method;

const PREFLIGHT_MAX_AGE_SECS: usize = 3600;

/// An empty origin list or a `*` entry allows any origin.
pub fn build_cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_any_header()
        .max_age(PREFLIGHT_MAX_AGE_SECS);

    if config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_any_origin();
        tracing::debug!("CORS: allowing any origin");
    } else {
        for origin in &config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        tracing::debug!(origins = ?config.allowed_origins, "CORS: allowed origins");
    }

    cors
}
